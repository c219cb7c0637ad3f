use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use super::framed;
use crate::{
    error::{ErrorKind, ValidationErrorKind},
    oid::ObjectId,
    raw::{RawDocument, RawDocumentBuf, ValidateOptions, MAX_DEPTH},
    spec::ElementType,
};

fn all_checks() -> ValidateOptions {
    ValidateOptions::default()
        .utf8(true)
        .dollar_keys(true)
        .dot_keys(true)
}

#[test]
fn clean_document_passes_every_check() {
    let doc = RawDocumentBuf::from_json(
        r#"{ "name": "x", "nested": { "list": [1, "two", { "k": null }] },
             "code": { "$code": "f()", "$scope": { "v": 1 } } }"#,
    )
    .unwrap();
    doc.validate(&all_checks()).unwrap();
}

#[test]
fn dot_keys() {
    let mut doc = RawDocumentBuf::new();
    doc.append("ok", 1).unwrap();
    let mut child = doc.append_document_begin("child").unwrap();
    child.append("a.b", 1).unwrap();
    child.end();

    doc.validate(&ValidateOptions::default()).unwrap();
    let err = doc
        .validate(&ValidateOptions::default().dot_keys(true))
        .unwrap_err();
    assert_eq!(err.validation_kind(), Some(&ValidationErrorKind::DotKey));
    // The child starts after "ok" (4 + 8) and its element after the child's own length.
    let child_offset = doc.get_element("child").unwrap().unwrap().value_offset();
    assert_eq!(err.offset, Some(child_offset + 4));
}

#[test]
fn dollar_keys_at_top_level() {
    let mut doc = RawDocumentBuf::new();
    doc.append("$ref", "coll").unwrap();
    doc.append("$id", 1).unwrap();

    let err = doc
        .validate(&ValidateOptions::default().dollar_keys(true))
        .unwrap_err();
    assert_eq!(err.validation_kind(), Some(&ValidationErrorKind::DollarKey));
    assert_eq!(err.offset, Some(4));
}

fn nested(build: impl FnOnce(&mut crate::raw::DocumentBuilder<'_>)) -> RawDocumentBuf {
    let mut doc = RawDocumentBuf::new();
    let mut child = doc.append_document_begin("ref").unwrap();
    build(&mut child);
    child.end();
    doc
}

#[test]
fn dbref_in_nested_document() {
    let options = ValidateOptions::default().dollar_keys(true);

    let good = nested(|d| {
        d.append("$ref", "coll").unwrap();
        d.append("$id", ObjectId::from_bytes([1; 12])).unwrap();
        d.append("$db", "db").unwrap();
        d.append("extra", true).unwrap();
    });
    good.validate(&options).unwrap();

    let without_db = nested(|d| {
        d.append("$ref", "coll").unwrap();
        d.append("$id", 1).unwrap();
    });
    without_db.validate(&options).unwrap();
}

#[test]
fn malformed_dbrefs() {
    let options = ValidateOptions::default().dollar_keys(true);
    let cases = [
        nested(|d| {
            d.append("$ref", 1).unwrap();
            d.append("$id", 1).unwrap();
        }),
        nested(|d| {
            d.append("$ref", "coll").unwrap();
            d.append("other", 1).unwrap();
        }),
        nested(|d| {
            d.append("$id", 1).unwrap();
        }),
        nested(|d| {
            d.append("$ref", "coll").unwrap();
            d.append("$id", 1).unwrap();
            d.append("$db", 1).unwrap();
        }),
        nested(|d| {
            d.append("$ref", "coll").unwrap();
        }),
    ];
    for doc in cases {
        let err = doc.validate(&options).unwrap_err();
        assert_matches!(
            err.validation_kind(),
            Some(ValidationErrorKind::InvalidDbRef { .. }),
            "{doc:?}"
        );
    }

    let other_dollar = nested(|d| {
        d.append("a", 1).unwrap();
        d.append("$set", 1).unwrap();
    });
    let err = other_dollar.validate(&options).unwrap_err();
    assert_eq!(err.validation_kind(), Some(&ValidationErrorKind::DollarKey));
}

#[test]
fn invalid_utf8() {
    // { "s": "\xff" }
    let mut elements = vec![ElementType::String as u8, b's', 0];
    elements.extend_from_slice(&2_i32.to_le_bytes());
    elements.extend_from_slice(&[0xff, 0]);
    let bytes = framed(&elements);
    let doc = RawDocument::from_bytes(&bytes).unwrap();

    doc.validate(&ValidateOptions::default()).unwrap();
    let err = doc
        .validate(&ValidateOptions::default().utf8(true))
        .unwrap_err();
    assert_eq!(err.validation_kind(), Some(&ValidationErrorKind::InvalidUtf8));
    assert_eq!(err.offset, Some(4));
}

#[test]
fn embedded_nul() {
    let mut doc = RawDocumentBuf::new();
    doc.append("k", 1).unwrap();
    doc.append("s", "a\0b").unwrap();

    let options = ValidateOptions::default().utf8(true);
    let err = doc.validate(&options).unwrap_err();
    assert_eq!(err.validation_kind(), Some(&ValidationErrorKind::EmbeddedNull));
    // Reported at the string's payload: 4 + 7 ("k") + 3 ("s" header).
    assert_eq!(err.offset, Some(14));

    doc.validate(&options.utf8_allow_null(true)).unwrap();
}

#[test]
fn corrupt_nested_document_is_malformed() {
    let mut inner = vec![ElementType::Boolean as u8, b'b', 0, 9];
    inner = framed(&inner);
    let mut elements = vec![ElementType::EmbeddedDocument as u8, b'd', 0];
    elements.extend_from_slice(&inner);
    let bytes = framed(&elements);
    let doc = RawDocument::from_bytes(&bytes).unwrap();

    let err = doc.validate(&ValidateOptions::default()).unwrap_err();
    assert!(err.is_malformed_value());
    // The inner document starts at 4 + 3 and its element after its length prefix.
    assert_eq!(err.offset, Some(7 + 4));
}

#[test]
fn depth_limit() {
    // Hand-build nesting one level deeper than the builders allow.
    let mut bytes = framed(&[]);
    for _ in 0..=MAX_DEPTH {
        let mut elements = vec![ElementType::EmbeddedDocument as u8, b'd', 0];
        elements.extend_from_slice(&bytes);
        bytes = framed(&elements);
    }
    let doc = RawDocument::from_bytes(&bytes).unwrap();
    let err = doc.validate(&ValidateOptions::default()).unwrap_err();
    assert_matches!(err.kind, ErrorKind::DepthExceeded { .. });
}

#[test]
fn corruption_under_invalid_utf8_key_is_found() {
    // { <0xff>: { "b": <bool byte 9> } }
    let inner = framed(&[ElementType::Boolean as u8, b'b', 0, 9]);
    let mut elements = vec![ElementType::EmbeddedDocument as u8, 0xff, 0];
    elements.extend_from_slice(&inner);
    let bytes = framed(&elements);
    let doc = RawDocument::from_bytes(&bytes).unwrap();

    let err = doc.validate(&ValidateOptions::default()).unwrap_err();
    assert!(err.is_malformed_value());
    assert_eq!(err.offset, Some(7 + 4));

    let err = doc
        .validate(&ValidateOptions::default().utf8(true))
        .unwrap_err();
    assert_eq!(err.validation_kind(), Some(&ValidationErrorKind::InvalidUtf8));
}

#[test]
fn corrupt_scope_under_invalid_utf8_key_is_found() {
    let scope = framed(&[ElementType::Boolean as u8, b'b', 0, 9]);
    let mut value = Vec::new();
    value.extend_from_slice(&((4 + 4 + 2 + scope.len()) as i32).to_le_bytes());
    value.extend_from_slice(&2_i32.to_le_bytes());
    value.extend_from_slice(b"f\0");
    value.extend_from_slice(&scope);
    let mut elements = vec![ElementType::JavaScriptCodeWithScope as u8, 0xff, 0];
    elements.extend_from_slice(&value);
    let bytes = framed(&elements);
    let doc = RawDocument::from_bytes(&bytes).unwrap();

    let err = doc.validate(&ValidateOptions::default()).unwrap_err();
    assert!(err.is_malformed_value());
    // Payload at 7, scope after the total length and the code string.
    assert_eq!(err.offset, Some(7 + 4 + 4 + 2 + 4));
}

#[test]
fn valid_nesting_under_invalid_utf8_key_passes() {
    let inner = framed(&[ElementType::Boolean as u8, b'b', 0, 1]);
    let mut elements = vec![ElementType::Array as u8, 0xfe, 0];
    elements.extend_from_slice(&inner);
    let bytes = framed(&elements);
    let doc = RawDocument::from_bytes(&bytes).unwrap();
    doc.validate(&ValidateOptions::default()).unwrap();
}
