mod props;
mod validate;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::{
    error::{ErrorKind, ValueAccessErrorKind},
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
    Binary,
    DateTime,
    Regex,
    Timestamp,
};
pub(crate) use props::{arbitrary_bson, arbitrary_key};

/// Frames `elements` as a document.
pub(crate) fn framed(elements: &[u8]) -> Vec<u8> {
    let mut bytes = ((elements.len() + 5) as i32).to_le_bytes().to_vec();
    bytes.extend_from_slice(elements);
    bytes.push(0);
    bytes
}

fn sample() -> RawDocumentBuf {
    let mut doc = RawDocumentBuf::new();
    doc.append("f64", 2.5).unwrap();
    doc.append("string", "hello").unwrap();
    let mut child = doc.append_document_begin("document").unwrap();
    child.append("inner", "surprise").unwrap();
    child.append("i64", 6_i64).unwrap();
    child.end();
    let mut array = doc.append_array_begin("array").unwrap();
    for word in ["binary", "serialized", "object", "notation"] {
        array.push(word).unwrap();
    }
    array.end();
    doc.append(
        "binary",
        &Binary {
            subtype: BinarySubtype::Generic,
            bytes: vec![1, 2, 3],
        },
    )
    .unwrap();
    doc.append("object_id", ObjectId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]))
        .unwrap();
    doc.append("boolean", true).unwrap();
    doc.append("datetime", DateTime::from_millis(1_000)).unwrap();
    doc.append("null", RawBsonRef::Null).unwrap();
    doc.append("regex", &Regex::new(r"end\s*$", "i")).unwrap();
    doc.append("int32", 23).unwrap();
    doc.append(
        "timestamp",
        Timestamp {
            time: 3542578,
            increment: 7,
        },
    )
    .unwrap();
    doc.append("int64", 46_i64).unwrap();
    doc.append("end", "END").unwrap();
    doc
}

#[test]
fn typed_getters() {
    let doc = sample();
    assert_eq!(doc.get_f64("f64").unwrap(), 2.5);
    assert_eq!(doc.get_str("string").unwrap(), "hello");
    assert_eq!(doc.get_document("document").unwrap().get_i64("i64").unwrap(), 6);
    assert_eq!(doc.get_array("array").unwrap().get_str(3).unwrap(), "notation");
    assert_eq!(doc.get_binary("binary").unwrap().bytes, &[1, 2, 3]);
    assert_eq!(doc.get_object_id("object_id").unwrap().bytes()[11], 12);
    assert!(doc.get_bool("boolean").unwrap());
    assert_eq!(doc.get_datetime("datetime").unwrap().timestamp_millis(), 1_000);
    assert_eq!(doc.get_regex("regex").unwrap().pattern, r"end\s*$");
    assert_eq!(doc.get_i32("int32").unwrap(), 23);
    assert_eq!(doc.get_timestamp("timestamp").unwrap().increment, 7);
    assert_eq!(doc.get_i64("int64").unwrap(), 46);
    assert_eq!(doc.count_keys().unwrap(), 14);
}

#[test]
fn getter_errors_name_the_key() {
    let doc = sample();

    let err = doc.get_i32("string").unwrap_err();
    assert_eq!(err.key.as_deref(), Some("string"));
    assert_matches!(
        err.kind,
        ErrorKind::ValueAccess {
            kind: ValueAccessErrorKind::UnexpectedType {
                actual: ElementType::String,
                expected: ElementType::Int32,
            }
        }
    );

    let err = doc.get_str("missing").unwrap_err();
    assert_matches!(
        err.kind,
        ErrorKind::ValueAccess {
            kind: ValueAccessErrorKind::NotPresent
        }
    );
    assert!(doc.get("missing").unwrap().is_none());
}

#[test]
fn queries() {
    let doc = sample();
    assert!(doc.has_field("end"));
    assert!(!doc.has_field("END"));
    assert_eq!(doc.get_ignore_case("END").unwrap().unwrap().as_str(), Some("END"));
    assert_eq!(
        doc.find_descendant("document.inner").unwrap().unwrap().as_str(),
        Some("surprise")
    );
    assert_eq!(
        doc.find_descendant("array.1").unwrap().unwrap().as_str(),
        Some("serialized")
    );
    assert!(doc.find_descendant("string.length").unwrap().is_none());
    assert!(doc.find_descendant("array.9").unwrap().is_none());
    assert!(!doc.is_empty());
    assert!(RawDocumentBuf::new().is_empty());
}

#[test]
fn iterate_in_insertion_order() {
    let doc = sample();
    let keys: Vec<&str> = doc.iter().map(|r| r.unwrap().0).collect();
    assert_eq!(
        keys,
        [
            "f64", "string", "document", "array", "binary", "object_id", "boolean", "datetime",
            "null", "regex", "int32", "timestamp", "int64", "end"
        ]
    );
}

#[test]
fn element_offsets_and_lengths() {
    let doc = sample();
    let mut iter = doc.iter_elements();
    assert!(iter.is_fresh());

    let first = iter.next().unwrap().unwrap();
    assert_eq!(first.offset(), 4);
    assert_eq!(first.key().unwrap(), "f64");
    assert_eq!(first.element_type(), ElementType::Double);
    assert_eq!(first.value_offset(), 4 + 1 + 4);
    assert_eq!(first.len(), 1 + 4 + 8);
    assert_eq!(first.value_bytes(), &2.5_f64.to_le_bytes());

    let second = iter.next().unwrap().unwrap();
    assert_eq!(second.offset(), first.offset() + first.len());

    let mut count = 2;
    for element in iter.by_ref() {
        element.unwrap();
        count += 1;
    }
    assert_eq!(count, 14);
    assert!(iter.is_exhausted());
    assert_eq!(iter.error_offset(), None);
}

#[test]
fn truncated_string_stops_iteration() {
    // "s" declares a ten byte string but only three bytes remain before the terminator.
    let mut elements = vec![ElementType::Int32 as u8, b'i', 0, 1, 0, 0, 0];
    elements.extend_from_slice(&[ElementType::String as u8, b's', 0]);
    elements.extend_from_slice(&10_i32.to_le_bytes());
    elements.extend_from_slice(b"abc");
    let bytes = framed(&elements);

    let doc = RawDocument::from_bytes(&bytes).unwrap();
    let mut iter = doc.iter_elements();
    assert_eq!(iter.next().unwrap().unwrap().key().unwrap(), "i");

    let err = iter.next().unwrap().unwrap_err();
    assert!(err.is_malformed_value());
    assert_eq!(err.key.as_deref(), Some("s"));
    assert_eq!(err.offset, Some(11));
    assert_eq!(iter.error_offset(), Some(11));

    assert!(iter.next().is_none());
    assert!(!iter.is_exhausted());
}

#[test]
fn corrupt_elements() {
    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("unknown tag", vec![0x42, b'k', 0]),
        ("unterminated key", vec![ElementType::Null as u8, b'k', b'e', b'y']),
        ("bad boolean", vec![ElementType::Boolean as u8, b'b', 0, 2]),
        ("short int32", vec![ElementType::Int32 as u8, b'n', 0, 1, 0]),
        (
            "negative string length",
            [&[ElementType::String as u8, b's', 0][..], &(-1_i32).to_le_bytes()].concat(),
        ),
        (
            "string without terminator",
            [&[ElementType::String as u8, b's', 0][..], &2_i32.to_le_bytes(), b"ab"].concat(),
        ),
        (
            "tiny embedded document",
            [&[ElementType::EmbeddedDocument as u8, b'd', 0][..], &4_i32.to_le_bytes()].concat(),
        ),
        (
            "oversized binary",
            [&[ElementType::Binary as u8, b'b', 0][..], &100_i32.to_le_bytes(), &[0]].concat(),
        ),
        (
            "old binary with wrong inner length",
            [
                &[ElementType::Binary as u8, b'b', 0][..],
                &6_i32.to_le_bytes(),
                &[2],
                &5_i32.to_le_bytes(),
                &[1, 2],
            ]
            .concat(),
        ),
        (
            "code with scope length mismatch",
            [
                &[ElementType::JavaScriptCodeWithScope as u8, b'c', 0][..],
                &17_i32.to_le_bytes(),
                &2_i32.to_le_bytes(),
                b"x\0",
                &5_i32.to_le_bytes(),
                &[0],
                &[0, 0],
            ]
            .concat(),
        ),
    ];

    for (name, elements) in cases {
        let bytes = framed(&elements);
        let doc = RawDocument::from_bytes(&bytes).unwrap();
        let mut iter = doc.iter_elements();
        let err = iter.next().unwrap().unwrap_err();
        assert!(err.is_malformed_value(), "{name}: {err}");
        assert_eq!(iter.error_offset(), Some(4), "{name}");
        assert!(iter.next().is_none(), "{name}");
    }
}

#[test]
fn framing_is_checked_up_front() {
    assert!(RawDocument::from_bytes(b"\x04\0\0\0").is_err());
    assert!(RawDocument::from_bytes(b"\x06\0\0\0\0").is_err());
    assert!(RawDocument::from_bytes(b"\x05\0\0\0\x01").is_err());
    assert!(RawDocumentBuf::from_bytes(b"\xff\xff\xff\xff\0".to_vec()).is_err());

    let mut iter = RawIter::from_bytes(b"\x06\0\0\0\0");
    assert!(iter.next().unwrap().is_err());
    assert_eq!(iter.error_offset(), Some(0));
    assert!(iter.next().is_none());
}

#[test]
fn invalid_utf8_key_is_reported_by_decoding_iterator() {
    let bytes = framed(&[ElementType::Null as u8, 0xff, 0]);
    let doc = RawDocument::from_bytes(&bytes).unwrap();

    let element = doc.iter_elements().next().unwrap().unwrap();
    assert_eq!(element.key_bytes(), &[0xff]);
    assert_matches!(element.key().unwrap_err().kind, ErrorKind::Utf8Encoding);

    let err = doc.iter().next().unwrap().unwrap_err();
    assert_matches!(err.kind, ErrorKind::Utf8Encoding);
    assert_eq!(err.offset, Some(4));
}

#[test]
fn nested_build_protocol() {
    let mut doc = RawDocumentBuf::new();
    let mut x = doc.append_document_begin("x").unwrap();
    x.append("y", 5).unwrap();
    assert_eq!(x.as_document().get_i32("y").unwrap(), 5);
    x.end();

    let entries: Vec<_> = doc.iter().map(|r| r.unwrap()).collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "x");
    let inner = entries[0].1.as_document().unwrap();
    let inner: Vec<_> = inner.iter().map(|r| r.unwrap()).collect();
    assert_eq!(inner, [("y", RawBsonRef::Int32(5))]);

    let inner = framed(&[ElementType::Int32 as u8, b'y', 0, 5, 0, 0, 0]);
    let mut expected = vec![ElementType::EmbeddedDocument as u8, b'x', 0];
    expected.extend_from_slice(&inner);
    assert_eq!(doc.as_bytes(), framed(&expected).as_slice());
}

#[test]
fn deeply_nested_builders_keep_lengths_consistent() {
    let mut doc = RawDocumentBuf::new();
    {
        let mut a = doc.append_document_begin("a").unwrap();
        let mut b = a.append_array_begin("b").unwrap();
        let mut c = b.push_document_begin().unwrap();
        c.append("d", "deep").unwrap();
        c.end();
        b.push(1).unwrap();
        assert_eq!(b.len(), 2);
        b.end();
        a.append("after", true).unwrap();
    }
    doc.append("tail", 1).unwrap();

    doc.validate(&ValidateOptions::default()).unwrap();
    assert_eq!(
        doc.find_descendant("a.b.0.d").unwrap().unwrap().as_str(),
        Some("deep")
    );
    assert_eq!(doc.find_descendant("a.b.1").unwrap().unwrap().as_i32(), Some(1));
    assert!(doc.find_descendant("a.after").unwrap().unwrap().as_bool().unwrap());
    assert_eq!(doc.get_i32("tail").unwrap(), 1);
}

#[test]
fn append_to_locked_parent_is_refused() {
    let mut doc = RawDocumentBuf::new();
    doc.append("before", 1).unwrap();
    let child = doc.append_document_begin("child").unwrap();
    // A leaked builder never closes its frame.
    std::mem::forget(child);
    let before = doc.as_bytes().to_vec();

    let err = doc.append("after", 2).unwrap_err();
    assert_matches!(err.kind, ErrorKind::Locked);
    assert_eq!(doc.as_bytes(), &before[..]);
    assert_matches!(doc.overwrite("before", 3).unwrap_err().kind, ErrorKind::Locked);
    assert_eq!(doc.as_bytes(), &before[..]);
}

#[test]
fn nesting_depth_is_limited() {
    fn open(builder: &mut DocumentBuilder<'_>, remaining: usize) -> crate::error::Result<()> {
        if remaining == 0 {
            return Ok(());
        }
        let mut child = builder.append_document_begin("d")?;
        open(&mut child, remaining - 1)
    }

    let mut doc = RawDocumentBuf::new();
    let mut root = doc.append_document_begin("d").unwrap();
    assert!(open(&mut root, MAX_DEPTH - 1).is_ok());
    let err = open(&mut root, MAX_DEPTH).unwrap_err();
    assert_matches!(err.kind, ErrorKind::DepthExceeded { max: MAX_DEPTH });
}

#[test]
fn inline_documents_move_to_the_heap() {
    let mut doc = RawDocumentBuf::new();
    assert!(doc.is_inline());
    assert_eq!(doc.capacity(), INLINE_CAPACITY);

    doc.append("s", "x".repeat(100).as_str()).unwrap();
    assert!(doc.is_inline());
    doc.append("t", "y".repeat(20).as_str()).unwrap();
    assert!(!doc.is_inline());
    assert!(doc.capacity().is_power_of_two());
    assert!(doc.capacity() >= doc.as_bytes().len());
    assert_eq!(doc.get_str("s").unwrap().len(), 100);
}

#[test]
fn static_documents_are_read_only() {
    static BYTES: [u8; 12] = [12, 0, 0, 0, 0x10, b'n', 0, 1, 0, 0, 0, 0];
    let mut doc = RawDocumentBuf::from_static(&BYTES).unwrap();
    assert!(doc.is_read_only());
    assert_eq!(doc.get_i32("n").unwrap(), 1);

    assert_matches!(doc.append("m", 2).unwrap_err().kind, ErrorKind::ReadOnly);
    assert_matches!(doc.overwrite("n", 2).unwrap_err().kind, ErrorKind::ReadOnly);
    assert_eq!(doc.as_bytes(), &BYTES[..]);

    // An owned copy is writable again.
    let mut copy = doc.to_raw_document_buf();
    copy.append("m", 2).unwrap();
    assert_eq!(copy.count_keys().unwrap(), 2);
}

#[test]
fn keys_with_nul_are_refused() {
    let mut doc = RawDocumentBuf::new();
    doc.append("ok", 1).unwrap();
    let before = doc.as_bytes().to_vec();
    assert_matches!(doc.append("a\0b", 1).unwrap_err().kind, ErrorKind::InvalidKey { .. });
    assert!(doc.append("r", &Regex::new("a\0", "")).is_err());
    assert_eq!(doc.as_bytes(), &before[..]);
}

#[test]
fn overwrite_in_place() {
    let mut doc = sample();
    let len = doc.as_bytes().len();

    doc.overwrite("f64", -1.5).unwrap();
    doc.overwrite("int32", 99).unwrap();
    doc.overwrite("int64", i64::MIN).unwrap();
    doc.overwrite("boolean", false).unwrap();
    assert_eq!(doc.as_bytes().len(), len);
    assert_eq!(doc.get_f64("f64").unwrap(), -1.5);
    assert_eq!(doc.get_i32("int32").unwrap(), 99);
    assert_eq!(doc.get_i64("int64").unwrap(), i64::MIN);
    assert!(!doc.get_bool("boolean").unwrap());

    let before = doc.as_bytes().to_vec();
    assert!(doc.overwrite("string", "other").is_err());
    assert!(doc.overwrite("int32", 1_i64).is_err());
    assert!(doc.overwrite("missing", 1).is_err());
    assert_eq!(doc.as_bytes(), &before[..]);
}

#[test]
fn copy_excluding_and_concat() {
    let doc = sample();
    let copy = doc
        .copy_excluding(&["document", "array", "end"])
        .unwrap();
    assert_eq!(copy.count_keys().unwrap(), 11);
    assert!(!copy.has_field("document"));
    assert_eq!(copy.get_str("string").unwrap(), "hello");

    let mut joined = RawDocumentBuf::new();
    joined.append("first", 1).unwrap();
    joined.concat(&copy).unwrap();
    assert_eq!(joined.count_keys().unwrap(), 12);
    let keys: Vec<_> = joined.iter().take(2).map(|r| r.unwrap().0).collect();
    assert_eq!(keys, ["first", "f64"]);
}

#[test]
fn concat_is_all_or_nothing() {
    let mut elements = vec![ElementType::Int32 as u8, b'a', 0, 1, 0, 0, 0];
    elements.extend_from_slice(&[ElementType::Boolean as u8, b'b', 0, 7]);
    let bytes = framed(&elements);
    let corrupt = RawDocument::from_bytes(&bytes).unwrap();

    let mut doc = RawDocumentBuf::new();
    doc.append("x", 1).unwrap();
    let before = doc.as_bytes().to_vec();
    assert!(doc.concat(corrupt).is_err());
    assert_eq!(doc.as_bytes(), &before[..]);
}

#[test]
fn append_element_copies_verbatim() {
    let source = sample();
    let mut target = RawDocumentBuf::new();
    for element in source.iter_elements() {
        target.append_element(&element.unwrap()).unwrap();
    }
    assert_eq!(target, source);

    let element = source.get_element("regex").unwrap().unwrap();
    let mut renamed = RawDocumentBuf::new();
    renamed.append_element_as("pattern", &element).unwrap();
    assert_eq!(renamed.get_regex("pattern").unwrap().options, "i");
}

#[test]
fn append_now_utc_and_str_or_null() {
    let mut doc = RawDocumentBuf::new();
    let before = DateTime::now();
    doc.append_now_utc("now").unwrap();
    doc.append_str_or_null("some", Some("x")).unwrap();
    doc.append_str_or_null("none", None).unwrap();

    assert!(doc.get_datetime("now").unwrap() >= before);
    assert_eq!(doc.get_str("some").unwrap(), "x");
    assert!(doc.get("none").unwrap().unwrap().is_null());
}

#[test]
fn iterators_and_errors_clone() {
    let bytes = [9, 0, 0, 0, 0];
    let mut iter = RawIter::from_bytes(&bytes);
    let mut copy = iter.clone();
    assert!(iter.next().unwrap().is_err());
    assert!(copy.next().unwrap().is_err());
    assert!(iter.next().is_none() && copy.next().is_none());
    assert_eq!(copy.error_offset(), Some(0));

    let io = crate::error::Error::from(std::io::Error::other("disk on fire"));
    let cloned = io.clone();
    assert_matches!(cloned.kind, ErrorKind::Io(_));
    assert_eq!(cloned.to_string(), io.to_string());
}

#[test]
fn lossy_coercions() {
    let doc = RawDocumentBuf::from_json(
        r#"{ "t": true, "d": -2.9, "z": 0.0, "i": 7, "l": 5000000000, "n": null, "s": "", "o": {} }"#,
    )
    .unwrap();
    let get = |key| doc.get(key).unwrap().unwrap();

    assert_eq!(get("t").as_i64_lossy(), Some(1));
    assert_eq!(get("d").as_i64_lossy(), Some(-2));
    assert_eq!(get("i").as_i64_lossy(), Some(7));
    assert_eq!(get("l").as_i64_lossy(), Some(5_000_000_000));
    assert_eq!(get("s").as_i64_lossy(), None);
    assert_eq!(RawBsonRef::Double(f64::NAN).as_i64_lossy(), Some(0));

    assert!(get("d").as_bool_lossy());
    assert!(!get("z").as_bool_lossy());
    assert!(!get("n").as_bool_lossy());
    assert!(get("s").as_bool_lossy());
    assert!(get("o").as_bool_lossy());
    assert!(!RawBsonRef::Int64(0).as_bool_lossy());
}

#[test]
fn append_seconds_and_timevals() {
    let mut doc = RawDocumentBuf::new();
    doc.append("secs", DateTime::from_unix_secs(90)).unwrap();
    doc.append("tv", DateTime::from_timeval(1, 2_500)).unwrap();
    doc.append("before", DateTime::from_timeval(0, -1)).unwrap();

    assert_eq!(doc.get_datetime("secs").unwrap().timestamp_millis(), 90_000);
    assert_eq!(doc.get_datetime("tv").unwrap().timestamp_millis(), 1_002);
    assert_eq!(doc.get_datetime("before").unwrap().timestamp_millis(), -1);
    assert_eq!(DateTime::from_unix_secs(i64::MAX), DateTime::MAX);
}

#[test]
fn compare_orders_by_length_then_bytes() {
    let mut short = RawDocumentBuf::new();
    short.append("a", 2).unwrap();
    let mut same_len = RawDocumentBuf::new();
    same_len.append("a", 1).unwrap();
    let mut long = RawDocumentBuf::new();
    long.append("aa", 0).unwrap();

    assert_eq!(short.compare(&long), std::cmp::Ordering::Less);
    assert_eq!(short.compare(&same_len), std::cmp::Ordering::Greater);
    assert_eq!(short.compare(&short.clone()), std::cmp::Ordering::Equal);
}

#[test]
fn clone_is_deep() {
    let mut doc = RawDocumentBuf::new();
    doc.append("s", "x".repeat(200).as_str()).unwrap();
    let copy = doc.clone();
    doc.overwrite("s", "y").unwrap_err();
    doc.append("n", 1).unwrap();
    assert_eq!(copy.count_keys().unwrap(), 1);
    assert_eq!(copy.capacity(), 256);
}

#[test]
fn owned_and_borrowed_values_agree() {
    let doc = sample();
    for entry in doc.iter() {
        let (_, value) = entry.unwrap();
        let owned = value.to_raw_bson();
        assert_eq!(owned.as_raw_bson_ref(), value);
        assert_eq!(owned.element_type(), value.element_type());
    }
}

#[test]
fn arrays() {
    let mut array = RawArrayBuf::new();
    array.push("a").unwrap();
    array.push(2).unwrap();
    array.push(true).unwrap();
    assert_eq!(array.len(), 3);
    assert_eq!(array.get_str(0).unwrap(), "a");
    assert_eq!(array.get_i32(1).unwrap(), 2);
    assert!(array.get(3).unwrap().is_none());
    assert!(array.get_bool(2).unwrap());
    assert_eq!(array.get_str(1).unwrap_err().key.as_deref(), Some("1"));

    let reread = RawArrayBuf::from_bytes(array.clone().into_bytes()).unwrap();
    assert_eq!(reread.len(), 3);
    assert_eq!(reread, array);
}

proptest! {
    #[test]
    fn no_crashes(s: Vec<u8>) {
        if let Ok(doc) = RawDocumentBuf::from_bytes(s) {
            for element in doc.iter_elements() {
                match element {
                    Ok(element) => { let _ = element.value(); }
                    Err(_) => break,
                }
            }
            let _ = doc.validate(&ValidateOptions::default().utf8(true).dollar_keys(true));
            let _ = doc.to_json();
        }
    }

    #[test]
    fn appended_values_read_back(key in arbitrary_key(), bson in arbitrary_bson()) {
        let mut doc = RawDocumentBuf::new();
        doc.append(&key, &bson).unwrap();
        doc.validate(&ValidateOptions::default()).unwrap();

        let reread = RawDocumentBuf::from_bytes(doc.as_bytes().to_vec()).unwrap();
        let (k, v) = reread.iter().next().unwrap().unwrap();
        prop_assert_eq!(k, key.as_str());
        prop_assert_eq!(v.to_raw_bson(), bson);
    }
}
