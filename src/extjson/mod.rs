//! Conversion between BSON documents and [MongoDB Extended JSON](https://www.mongodb.com/docs/manual/reference/mongodb-extended-json-v1/)
//! text.
//!
//! ## Overview of Extended JSON
//!
//! Plain JSON cannot represent every BSON type, so extended JSON encodes type information with
//! wrapper objects whose single (or first) key starts with `$`. For example, an ObjectId is
//! written as
//! ```text
//! { "$oid" : "507f1f77bcf86cd799439011" }
//! ```
//! and a binary value as
//! ```text
//! { "$binary" : "AAEC", "$type" : "00" }
//! ```
//!
//! Rendering ([`RawDocument::to_json`](crate::raw::RawDocument::to_json)) produces the legacy
//! format written by the C driver: 32-bit integers, finite doubles, booleans and null are plain
//! JSON values, 64-bit integers are `$numberLong` strings, and dates are `$date` millisecond
//! counts. Parsing ([`RawDocumentBuf::from_json`](crate::raw::RawDocumentBuf::from_json) and
//! [`JsonReader`]) accepts everything rendering produces, along with `$numberInt`,
//! `$numberDouble`, ISO-8601 and `$numberLong` dates, and the object form of `$binary`.
//!
//! ```rust
//! use bson_core::raw::RawDocumentBuf;
//!
//! let doc = RawDocumentBuf::from_json(r#"{ "x" : { "$numberLong" : "5" }, "y" : [ 1.5 ] }"#)?;
//! assert_eq!(doc.get_i64("x")?, 5);
//! assert_eq!(doc.to_json()?, r#"{ "x" : { "$numberLong" : "5" }, "y" : [ 1.5 ] }"#);
//! # Ok::<(), bson_core::error::Error>(())
//! ```

mod parser;
mod reader;
mod render;
mod tokenizer;

pub use reader::{JsonReader, JsonReaderOptions};
