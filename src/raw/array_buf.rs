use std::{
    borrow::{Borrow, Cow},
    fmt::Debug,
};

use super::{RawArray, RawArrayIter, RawBsonRef, RawDocumentBuf};
use crate::error::Result;

/// An owned BSON array value (akin to [`std::path::PathBuf`]), backed by a buffer of raw BSON
/// bytes. Values are keyed `"0"`, `"1"`, ... in the order they are pushed.
///
/// ```
/// use bson_core::raw::RawArrayBuf;
///
/// let mut array = RawArrayBuf::new();
/// array.push("a string")?;
/// array.push(12_i32)?;
///
/// let mut iter = array.iter();
/// assert_eq!(iter.next().unwrap()?.as_str(), Some("a string"));
/// assert_eq!(iter.next().unwrap()?.as_i32(), Some(12));
/// assert!(iter.next().is_none());
/// # Ok::<(), bson_core::error::Error>(())
/// ```
#[derive(Clone, PartialEq)]
pub struct RawArrayBuf {
    inner: RawDocumentBuf,
    len: usize,
}

impl RawArrayBuf {
    /// Construct a new, empty `RawArrayBuf`.
    pub fn new() -> RawArrayBuf {
        Self {
            inner: RawDocumentBuf::new(),
            len: 0,
        }
    }

    /// Wraps a document as an array. Elements that fail to decode are not counted.
    pub(crate) fn from_raw_document_buf(doc: RawDocumentBuf) -> Self {
        let len = doc.iter_elements().take_while(|e| e.is_ok()).count();
        Self { inner: doc, len }
    }

    /// Constructs an array from encoded bytes, validating the framing the same way
    /// [`RawDocumentBuf::from_bytes`] does.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        RawDocumentBuf::from_bytes(bytes).map(Self::from_raw_document_buf)
    }

    /// Appends a value at the next index.
    pub fn push<'a>(&mut self, value: impl Into<RawBsonRef<'a>>) -> Result<()> {
        self.inner.append(self.len.to_string(), value)?;
        self.len += 1;
        Ok(())
    }

    /// The number of values in the array.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_bytes()
    }
}

impl Default for RawArrayBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for RawArrayBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawArrayBuf")
            .field("data", &hex::encode(self.as_bytes()))
            .field("len", &self.len)
            .finish()
    }
}

impl std::ops::Deref for RawArrayBuf {
    type Target = RawArray;

    fn deref(&self) -> &Self::Target {
        RawArray::from_doc(&self.inner)
    }
}

impl AsRef<RawArray> for RawArrayBuf {
    fn as_ref(&self) -> &RawArray {
        RawArray::from_doc(&self.inner)
    }
}

impl Borrow<RawArray> for RawArrayBuf {
    fn borrow(&self) -> &RawArray {
        self.as_ref()
    }
}

impl<'a> IntoIterator for &'a RawArrayBuf {
    type IntoIter = RawArrayIter<'a>;
    type Item = Result<RawBsonRef<'a>>;

    fn into_iter(self) -> RawArrayIter<'a> {
        self.as_ref().into_iter()
    }
}

impl<'a> From<RawArrayBuf> for Cow<'a, RawArray> {
    fn from(rd: RawArrayBuf) -> Self {
        Cow::Owned(rd)
    }
}

impl<'a> From<&'a RawArrayBuf> for Cow<'a, RawArray> {
    fn from(rd: &'a RawArrayBuf) -> Self {
        Cow::Borrowed(rd.as_ref())
    }
}
