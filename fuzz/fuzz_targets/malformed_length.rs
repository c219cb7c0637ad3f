#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate bson_core;
use bson_core::{RawDocument, SliceReader};

fuzz_target!(|buf: &[u8]| {
    if buf.len() >= 4 {
        // Focus on document length field manipulation
        let _ = RawDocument::from_bytes(buf);
        let mut reader = SliceReader::new(buf);
        while let Ok(Some(_)) = reader.read_next() {}
    }
});
