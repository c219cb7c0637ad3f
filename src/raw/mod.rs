//! An API for interacting with raw BSON bytes.
//!
//! This module provides two document types, [`RawDocumentBuf`] and [`RawDocument`] (akin to
//! [`std::string::String`] and [`str`]), for building and reading BSON without converting it
//! into an intermediate tree. Reading is lazy: bytes are validated one element at a time as
//! the [`RawIter`] reaches them, and values are returned as [`RawBsonRef`]s borrowing from the
//! document.
//!
//! ```rust
//! use bson_core::raw::RawDocument;
//!
//! // See http://bsonspec.org/spec.html for details on the binary encoding of BSON.
//! let doc = RawDocument::from_bytes(b"\x13\x00\x00\x00\x02hi\x00\x06\x00\x00\x00y'all\x00\x00")?;
//! let elem = doc.get("hi")?.unwrap();
//!
//! assert_eq!(
//!   elem.as_str(),
//!   Some("y'all"),
//! );
//! # Ok::<(), bson_core::error::Error>(())
//! ```
//!
//! ### Building documents
//!
//! Appends write the encoded element straight into the document's buffer. Nested documents and
//! arrays are built in place: [`RawDocumentBuf::append_document_begin`] returns a
//! [`DocumentBuilder`] that mutably borrows the parent until it is ended or dropped, so the
//! parent cannot be appended to while the child is open.
//!
//! ```rust
//! use bson_core::raw::RawDocumentBuf;
//!
//! let mut doc = RawDocumentBuf::new();
//! let mut child = doc.append_document_begin("x")?;
//! child.append("y", 5)?;
//! child.end();
//!
//! let x = doc.get_document("x")?;
//! assert_eq!(x.get_i32("y")?, 5);
//! # Ok::<(), bson_core::error::Error>(())
//! ```
//!
//! ### Iteration
//!
//! [`RawDocument`] implements [`IntoIterator`](std::iter::IntoIterator), which can also be
//! accessed via [`RawDocument::iter`]. For access to offsets, raw key bytes and
//! undecoded payloads, use [`RawDocument::iter_elements`].
//!
//! ```rust
//! use bson_core::raw::RawDocumentBuf;
//!
//! let mut doc = RawDocumentBuf::new();
//! doc.append("crate", "bson")?;
//! doc.append("year", "2021")?;
//!
//! let mut doc_iter = doc.iter();
//!
//! let (key, value) = doc_iter.next().unwrap()?;
//! assert_eq!(key, "crate");
//! assert_eq!(value.as_str(), Some("bson"));
//!
//! let (key, value) = doc_iter.next().unwrap()?;
//! assert_eq!(key, "year");
//! assert_eq!(value.as_str(), Some("2021"));
//! # Ok::<(), bson_core::error::Error>(())
//! ```

mod array;
mod array_buf;
mod bson_ref;
pub(crate) mod buffer;
mod builder;
mod document;
mod document_buf;
pub(crate) mod encode;
mod iter;
mod owned_bson;
mod validate;
mod visit;

#[cfg(test)]
pub(crate) mod test;

use crate::error::{Error, ErrorKind, Result};

pub use self::{
    array::{RawArray, RawArrayIter},
    array_buf::RawArrayBuf,
    bson_ref::{
        RawBinaryRef,
        RawBsonRef,
        RawDbPointerRef,
        RawJavaScriptCodeWithScopeRef,
        RawRegexRef,
    },
    builder::{ArrayBuilder, DocumentBuilder},
    document::RawDocument,
    document_buf::RawDocumentBuf,
    iter::{Iter, RawElement, RawIter},
    owned_bson::{RawBson, RawJavaScriptCodeWithScope},
    validate::ValidateOptions,
    visit::{visit_all, Visit, Visitor},
};

/// Documents whose encoded length fits in this many bytes are stored without a heap allocation.
pub const INLINE_CAPACITY: usize = 120;

/// The largest encoded document: the maximum of its signed 32-bit length prefix.
pub const MAX_DOCUMENT_SIZE: usize = i32::MAX as usize;

/// The deepest nesting of documents and arrays that is built, parsed, validated or rendered.
pub const MAX_DEPTH: usize = 100;

/// The length of an empty document: the length prefix and the terminating nul.
pub const MIN_BSON_DOCUMENT_SIZE: i32 = 4 + 1;

/// total length + code string (length and nul) + empty scope
pub(crate) const MIN_CODE_WITH_SCOPE_SIZE: i32 = 4 + (4 + 1) + MIN_BSON_DOCUMENT_SIZE;

/// The bytes of an empty document.
pub(crate) const EMPTY_DOCUMENT: [u8; 5] = [5, 0, 0, 0, 0];

/// Given a u8 slice, return a fixed-size array of its first `N` bytes, or an error if it is
/// too short.
pub(crate) fn read_array<const N: usize>(buf: &[u8]) -> Result<[u8; N]> {
    buf.get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            Error::malformed_value(format!("expected {} bytes, got {}", N, buf.len().min(N)))
        })
}

/// Given a u8 slice, return an i32 calculated from the first four bytes in
/// little endian order.
pub(crate) fn i32_from_slice(val: &[u8]) -> Result<i32> {
    read_array(val).map(i32::from_le_bytes)
}

pub(crate) fn i64_from_slice(val: &[u8]) -> Result<i64> {
    read_array(val).map(i64::from_le_bytes)
}

pub(crate) fn f64_from_slice(val: &[u8]) -> Result<f64> {
    read_array(val).map(f64::from_le_bytes)
}

/// Checked UTF-8 decoding of keys and string payloads.
pub(crate) fn try_to_str(data: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(data).map_err(|_| ErrorKind::Utf8Encoding.into())
}

/// Given a buffer starting at a nul-terminated string, return the string's bytes without the
/// terminator.
pub(crate) fn read_nullterminated(buf: &[u8]) -> Result<&[u8]> {
    match buf.iter().position(|b| *b == 0) {
        Some(len) => Ok(&buf[..len]),
        None => Err(Error::malformed_value("expected null terminator")),
    }
}
