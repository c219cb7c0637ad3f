#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate bson_core;
use bson_core::{
    extjson::{JsonReader, JsonReaderOptions},
    RawDocumentBuf,
};

fuzz_target!(|buf: &[u8]| {
    if let Ok(text) = std::str::from_utf8(buf) {
        if let Ok(doc) = RawDocumentBuf::from_json(text) {
            if let Ok(json) = doc.to_json() {
                let reparsed = RawDocumentBuf::from_json(&json).expect("rendered documents parse");
                assert_eq!(reparsed, doc);
            }
        }
    }

    // Feed the same bytes in two chunks to exercise resumption.
    let mut reader = JsonReader::from_data(JsonReaderOptions::default().allow_multiple(true));
    let (head, tail) = buf.split_at(buf.len() / 2);
    reader.ingest(head);
    let _ = reader.read_document();
    reader.ingest(tail);
    reader.close_input();
    while let Ok(Some(_)) = reader.read_document() {}
});
