#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate bson_core;
use bson_core::raw::{RawDocument, ValidateOptions};

fuzz_target!(|buf: &[u8]| {
    if let Ok(doc) = RawDocument::from_bytes(buf) {
        for element in doc.iter_elements() {
            match element {
                Ok(element) => {
                    let _ = element.key();
                    let _ = element.value();
                }
                Err(_) => break,
            }
        }
        let _ = doc.validate(&ValidateOptions::default().utf8(true).dollar_keys(true));
    }
});
