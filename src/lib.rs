// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! A BSON document engine: building documents in place, reading them lazily and safely from
//! untrusted bytes, and converting them to and from extended JSON.
//!
//! BSON is a binary format in which zero or more key/value pairs are stored as a single entity.
//! We call this entity a document. This library supports version 1.1 of the
//! [BSON standard](http://bsonspec.org/spec.html).
//!
//! ## Basic usage
//!
//! ```rust
//! use bson_core::raw::{RawDocument, RawDocumentBuf};
//!
//! let mut doc = RawDocumentBuf::new();
//! doc.append("a", 1)?;
//! doc.append("b", "hello")?;
//! doc.append("c", true)?;
//!
//! let bytes = doc.into_bytes();
//! let doc = RawDocument::from_bytes(&bytes)?;
//! let keys = doc
//!     .iter()
//!     .map(|e| e.map(|(key, _)| key))
//!     .collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(keys, ["a", "b", "c"]);
//! assert_eq!(doc.to_json()?, r#"{ "a" : 1, "b" : "hello", "c" : true }"#);
//! # Ok::<(), bson_core::error::Error>(())
//! ```
//!
//! ## Layout
//!
//! - [`raw`] holds the document types, the element iterator, visitors and validation.
//! - [`extjson`] renders documents as extended JSON and parses JSON text, incrementally if need
//!   be, back into documents.
//! - [`reader`] and [`writer`] handle sequences of documents stored back to back.
//! - [`oid`] generates and parses ObjectIds.

mod base64;
mod binary;
mod bson;
pub mod datetime;
pub mod error;
pub mod extjson;
pub mod oid;
pub mod raw;
pub mod reader;
pub mod spec;
pub mod writer;

#[cfg(test)]
mod tests;

pub use self::{
    binary::Binary,
    bson::{DbPointer, Regex, Timestamp},
    datetime::DateTime,
    oid::ObjectId,
    raw::{RawArray, RawArrayBuf, RawBson, RawBsonRef, RawDocument, RawDocumentBuf},
    reader::{Reader, SliceReader},
    writer::Writer,
};
