use proptest::prelude::*;

use crate::{
    oid::ObjectId,
    raw::{RawArrayBuf, RawBson, RawDocumentBuf, RawJavaScriptCodeWithScope},
    spec::BinarySubtype,
    Binary,
    DateTime,
    DbPointer,
    Regex,
    Timestamp,
};

fn arbitrary_binary_subtype() -> impl Strategy<Value = BinarySubtype> {
    prop_oneof![
        Just(BinarySubtype::Generic),
        Just(BinarySubtype::Function),
        Just(BinarySubtype::BinaryOld),
        Just(BinarySubtype::UuidOld),
        Just(BinarySubtype::Uuid),
        Just(BinarySubtype::Md5),
        (0x80u8..=0xff).prop_map(BinarySubtype::from),
    ]
}

/// Keys that extended JSON reads back as ordinary keys.
pub(crate) fn arbitrary_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.\"\\\\]{0,8}"
}

fn document_of(entries: Vec<(String, RawBson)>) -> RawDocumentBuf {
    let mut doc = RawDocumentBuf::new();
    for (key, value) in &entries {
        doc.append(key, value).unwrap();
    }
    doc
}

/// Any value except NaN, whose payload bits JSON does not preserve.
pub(crate) fn arbitrary_bson() -> impl Strategy<Value = RawBson> {
    let leaf = prop_oneof![
        Just(RawBson::Null),
        Just(RawBson::Undefined),
        Just(RawBson::MinKey),
        Just(RawBson::MaxKey),
        "\\PC*".prop_map(RawBson::String),
        any::<bool>().prop_map(RawBson::Boolean),
        any::<f64>()
            .prop_filter("NaN", |f| !f.is_nan())
            .prop_map(RawBson::Double),
        any::<i32>().prop_map(RawBson::Int32),
        any::<i64>().prop_map(RawBson::Int64),
        any::<i64>().prop_map(|ms| RawBson::DateTime(DateTime::from_millis(ms))),
        any::<(u32, u32)>().prop_map(|(time, increment)| RawBson::Timestamp(Timestamp {
            time,
            increment
        })),
        ("[^\0]{0,8}", "[ilmsux]{0,3}")
            .prop_map(|(pattern, options)| RawBson::RegularExpression(Regex::new(pattern, options))),
        any::<[u8; 12]>().prop_map(|bytes| RawBson::ObjectId(ObjectId::from_bytes(bytes))),
        (arbitrary_binary_subtype(), any::<Vec<u8>>())
            .prop_map(|(subtype, bytes)| RawBson::Binary(Binary { subtype, bytes })),
        "\\PC*".prop_map(RawBson::JavaScriptCode),
        "\\PC*".prop_map(RawBson::Symbol),
        ("[a-z.]{1,12}", any::<[u8; 12]>()).prop_map(|(ns, id)| RawBson::DbPointer(
            DbPointer::new(ns, ObjectId::from_bytes(id))
        )),
    ];

    leaf.prop_recursive(4, 256, 10, |inner| {
        prop_oneof![
            prop::collection::vec((arbitrary_key(), inner.clone()), 0..8)
                .prop_map(|entries| RawBson::Document(document_of(entries))),
            prop::collection::vec(inner.clone(), 0..8).prop_map(|values| {
                let mut array = RawArrayBuf::new();
                for value in &values {
                    array.push(value).unwrap();
                }
                RawBson::Array(array)
            }),
            (prop::collection::vec((arbitrary_key(), inner), 0..8), "\\PC*").prop_map(
                |(scope, code)| RawBson::JavaScriptCodeWithScope(RawJavaScriptCodeWithScope {
                    code,
                    scope: document_of(scope),
                })
            ),
        ]
    })
}
