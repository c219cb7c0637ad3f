use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use bson_core::{
    error::ErrorKind,
    extjson::{JsonReader, JsonReaderOptions},
    oid::ObjectId,
    raw::{RawBsonRef, RawDocument, ValidateOptions},
    spec::{BinarySubtype, ElementType},
    DateTime,
    RawDocumentBuf,
    Reader,
    SliceReader,
    Writer,
};

#[test]
fn encode_and_decode_three_fields() {
    let mut doc = RawDocumentBuf::new();
    doc.append("a", 1).unwrap();
    doc.append("b", "hello").unwrap();
    doc.append("c", true).unwrap();

    let bytes = doc.into_bytes();
    assert_eq!(bytes.len(), 29);
    assert_eq!(&bytes[..4], &29_i32.to_le_bytes());

    let decoded = RawDocument::from_bytes(&bytes).unwrap();
    let fields: Vec<_> = decoded.iter().map(|r| r.unwrap()).collect();
    assert_eq!(
        fields,
        [
            ("a", RawBsonRef::Int32(1)),
            ("b", RawBsonRef::String("hello")),
            ("c", RawBsonRef::Boolean(true)),
        ]
    );
}

#[test]
fn nested_documents_through_builders() {
    let mut doc = RawDocumentBuf::new();
    let mut x = doc.append_document_begin("x").unwrap();
    x.append("y", 5).unwrap();
    x.end();

    let mut iter = doc.iter_elements();
    let element = iter.next().unwrap().unwrap();
    assert!(iter.next().is_none());
    assert_eq!(element.key().unwrap(), "x");
    assert_eq!(element.element_type(), ElementType::EmbeddedDocument);

    let inner = element.value().unwrap().as_document().unwrap();
    let mut inner = inner.iter_elements();
    let y = inner.next().unwrap().unwrap();
    assert!(inner.next().is_none());
    assert_eq!(y.key().unwrap(), "y");
    assert_eq!(y.element_type(), ElementType::Int32);
    assert_eq!(y.value().unwrap(), RawBsonRef::Int32(5));
}

#[test]
fn truncated_string_is_reported_without_reading_past_the_end() {
    // { "s": <string declaring 10 bytes> } with only "abc" and the terminator left.
    let mut bytes = vec![0; 4];
    bytes.extend_from_slice(&[ElementType::String as u8, b's', 0]);
    bytes.extend_from_slice(&10_i32.to_le_bytes());
    bytes.extend_from_slice(b"abc");
    bytes.push(0);
    let len = bytes.len() as i32;
    bytes[..4].copy_from_slice(&len.to_le_bytes());

    let doc = RawDocument::from_bytes(&bytes).unwrap();
    let mut iter = doc.iter_elements();
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
    assert_matches!(iter.error_offset(), Some(offset) if offset > 0);
}

#[test]
fn object_id_and_date_render_as_json() {
    let oid = ObjectId::new();
    let mut doc = RawDocumentBuf::new();
    doc.append("id", oid).unwrap();
    doc.append("when", DateTime::from_millis(0)).unwrap();

    assert_eq!(
        doc.to_json().unwrap(),
        format!(r#"{{ "id" : {{ "$oid" : "{}" }}, "when" : {{ "$date" : 0 }} }}"#, oid.to_hex())
    );
}

#[test]
fn binary_parses_from_json() {
    let doc = RawDocumentBuf::from_json(r#"{"bin": {"$binary": "AAEC", "$type": "00"}}"#).unwrap();
    let element = doc.get_element("bin").unwrap().unwrap();
    assert_eq!(element.element_type(), ElementType::Binary);
    let binary = doc.get_binary("bin").unwrap();
    assert_eq!(binary.subtype, BinarySubtype::Generic);
    assert_eq!(binary.bytes, &[0x00, 0x01, 0x02]);
}

#[test]
fn parent_is_locked_while_a_child_is_open() {
    let mut doc = RawDocumentBuf::new();
    doc.append("a", 1).unwrap();

    let child = doc.append_document_begin("child").unwrap();
    std::mem::forget(child);
    // The open child's empty frame is already spliced in: 12 + 1 + 6 + 5 bytes.
    let before = doc.as_bytes().to_vec();
    assert_eq!(before.len(), 24);

    assert_matches!(doc.append("b", 2).unwrap_err().kind, ErrorKind::Locked);
    assert_matches!(
        doc.append_document_begin("other").map(|_| ()).unwrap_err().kind,
        ErrorKind::Locked
    );
    assert_eq!(doc.as_bytes(), &before[..]);
}

#[test]
fn stream_write_then_read() {
    let mut buf = Vec::new();
    let mut writer = Writer::new(&mut buf);
    for i in 0..100 {
        let mut doc = writer.begin().unwrap();
        doc.append("i", i).unwrap();
        let mut tags = doc.append_array_begin("tags").unwrap();
        tags.push("x").unwrap();
        tags.end();
        if i % 10 == 9 {
            doc.rollback();
        } else {
            doc.end();
        }
    }

    let mut seen = Vec::new();
    let mut reader = Reader::new(&buf[..]);
    while let Some(doc) = reader.read_next().unwrap() {
        doc.validate(&ValidateOptions::default().utf8(true)).unwrap();
        seen.push(doc.get_i32("i").unwrap());
    }
    let expected: Vec<i32> = (0..100).filter(|i| i % 10 != 9).collect();
    assert_eq!(seen, expected);
    assert_eq!(reader.tell(), buf.len() as u64);

    let mut slices = SliceReader::new(&buf);
    let mut count = 0;
    while slices.read_next().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 90);
}

#[test]
fn json_stream_to_bson_and_back() {
    let input = concat!(
        r#"{ "n" : 1, "when" : { "$date" : "2020-06-09T10:58:07.095Z" } }"#,
        "\n",
        r#"{ "n" : 2, "big" : { "$numberLong" : "5000000000" } }"#,
        "\n",
    );
    let options = JsonReaderOptions::default()
        .allow_multiple(true)
        .chunk_size(7);
    let mut reader = JsonReader::with_options(input.as_bytes(), options);

    let first = reader.read_document().unwrap().unwrap();
    assert_eq!(first.get_datetime("when").unwrap().timestamp_millis(), 1_591_700_287_095);
    assert_eq!(
        first.to_json().unwrap(),
        r#"{ "n" : 1, "when" : { "$date" : 1591700287095 } }"#
    );

    let second = reader.read_document().unwrap().unwrap();
    assert_eq!(second.get_i64("big").unwrap(), 5_000_000_000);
    assert_eq!(second.to_json().unwrap(), input.lines().nth(1).unwrap());

    assert!(reader.read_document().unwrap().is_none());
}
