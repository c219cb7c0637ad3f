#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate bson_core;
use bson_core::{spec::BinarySubtype, RawBsonRef, RawDocument};

fuzz_target!(|buf: &[u8]| {
    if let Ok(doc) = RawDocument::from_bytes(buf) {
        for elem in doc.iter_elements().flatten() {
            match elem.value() {
                Ok(RawBsonRef::String(s)) => {
                    let _ = s.chars().count();
                }
                Ok(RawBsonRef::Binary(b)) if b.subtype == BinarySubtype::Generic => {
                    let _ = std::str::from_utf8(b.bytes);
                }
                _ => {}
            }
        }
        let _ = doc.to_json();
    }
});
