use std::{collections::HashSet, sync::Arc, thread};

use pretty_assertions::assert_eq;

use crate::{
    error::ObjectIdErrorKind,
    oid::{Context, ContextOptions, LocalContext, ObjectId},
};

#[test]
fn string_oid() {
    let s = "123456789012123456789012";
    let oid = ObjectId::parse_str(s).unwrap();
    assert_eq!(hex::encode(oid.bytes()), s);
    assert_eq!(s.parse::<ObjectId>().unwrap(), oid);
}

#[test]
fn byte_string_oid() {
    let s = "541b1a00e8a23afa832b218e";
    let oid = ObjectId::parse_str(s).unwrap();
    let bytes: [u8; 12] = [
        0x54, 0x1B, 0x1A, 0x00, 0xE8, 0xA2, 0x3A, 0xFA, 0x83, 0x2B, 0x21, 0x8E,
    ];
    assert_eq!(bytes, oid.bytes());
    assert_eq!(s, oid.to_string());
    assert_eq!(s, oid.to_hex());
}

#[test]
fn uppercase_hex_is_accepted() {
    let lower = ObjectId::parse_str("541b1a00e8a23afa832b218e").unwrap();
    let upper = ObjectId::parse_str("541B1A00E8A23AFA832B218E").unwrap();
    assert_eq!(lower, upper);
    assert_eq!(upper.to_hex(), "541b1a00e8a23afa832b218e");
}

#[test]
fn validity() {
    assert!(ObjectId::is_valid("541b1a00e8a23afa832b218e"));
    assert!(!ObjectId::is_valid("541b1a00e8a23afa832b218"));
    assert!(!ObjectId::is_valid("541b1a00e8a23afa832b218e0"));
    assert!(!ObjectId::is_valid("541b1a00e8a23afa832b218g"));

    let err = ObjectId::parse_str("541b1a00e8a23afa832b218").unwrap_err();
    assert_eq!(
        err.object_id_kind(),
        Some(&ObjectIdErrorKind::InvalidLength { length: 23 })
    );
    let err = ObjectId::parse_str("541b1a00e8a23afa832b218g").unwrap_err();
    assert_eq!(
        err.object_id_kind(),
        Some(&ObjectIdErrorKind::InvalidCharacter { c: 'g', index: 23 })
    );
}

#[test]
fn timestamp() {
    let oid = ObjectId::with_timestamp(123);
    assert_eq!(oid.timestamp().timestamp_millis(), 123_000);
    assert_eq!(&oid.bytes()[4..], &[0; 8]);

    let oid = ObjectId::from_parts(0xffff_ffff, [1, 2, 3], 4, 5);
    assert_eq!(oid.timestamp().timestamp_millis(), 0xffff_ffff_i64 * 1000);
    assert_eq!(oid.counter(), 5);
}

#[test]
fn oid_not_equals() {
    assert!(ObjectId::new() != ObjectId::new());
}

#[test]
fn ordering_follows_bytes() {
    let a = ObjectId::from_bytes([0; 12]);
    let mut bytes = [0; 12];
    bytes[0] = 1;
    let b = ObjectId::from_bytes(bytes);
    assert!(a < b);
}

#[test]
fn local_context_counts_up() {
    let ctx = LocalContext::new(ContextOptions::default());
    let first = ctx.generate();
    let second = ctx.generate();
    assert_eq!(second.counter(), (first.counter() + 1) & 0x00ff_ffff);
    assert_eq!(&first.bytes()[4..7], &second.bytes()[4..7]);
}

#[test]
fn contexts_are_isolated() {
    let a = Context::new(ContextOptions::default());
    let b = Context::new(ContextOptions::default());
    // Random machine ids collide with probability 2^-24; also compare the counter seed.
    let (x, y) = (a.generate(), b.generate());
    assert!(x.bytes()[4..7] != y.bytes()[4..7] || x.counter() != y.counter());
}

#[test]
fn concurrent_generation_is_unique() {
    let ctx = Arc::new(Context::new(ContextOptions::default().cache_pid(true)));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || (0..1000).map(|_| ctx.generate()).collect::<Vec<_>>())
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for oid in handle.join().unwrap() {
            assert!(seen.insert(oid.counter()), "duplicate counter in {oid}");
        }
    }
    assert_eq!(seen.len(), 8000);

    let global = Context::global().generate();
    assert_eq!(&Context::global().generate().bytes()[4..7], &global.bytes()[4..7]);
}

#[test]
fn sequence_ids_count_up() {
    let ctx = LocalContext::new(ContextOptions::default());
    let first = ctx.generate_sequence();
    let second = ctx.generate_sequence();
    let sequence = |oid: ObjectId| u64::from_be_bytes(oid.bytes()[4..].try_into().unwrap());
    assert_eq!(sequence(second), sequence(first) + 1);
    assert!(first.timestamp() <= second.timestamp());
}

#[test]
fn concurrent_sequences_are_unique() {
    let ctx = Arc::new(Context::new(ContextOptions::default()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || (0..500).map(|_| ctx.generate_sequence()).collect::<Vec<_>>())
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for oid in handle.join().unwrap() {
            assert!(seen.insert(oid.bytes()[4..].to_vec()), "duplicate sequence in {oid}");
        }
    }
    assert_eq!(seen.len(), 2000);
}
