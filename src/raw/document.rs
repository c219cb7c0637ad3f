use std::{borrow::Cow, cmp::Ordering};

use super::{
    i32_from_slice,
    Iter,
    RawArray,
    RawBinaryRef,
    RawBsonRef,
    RawDocumentBuf,
    RawElement,
    RawIter,
    RawRegexRef,
    MIN_BSON_DOCUMENT_SIZE,
};
use crate::{
    error::{Error, Result},
    oid::ObjectId,
    spec::ElementType,
    DateTime,
    Timestamp,
};

/// A slice of a BSON document (akin to [`std::str`]). This can be created from a
/// [`RawDocumentBuf`] or any type that contains valid BSON data, including static binary literals,
/// [Vec<u8>](std::vec::Vec), or arrays.
///
/// This is an _unsized_ type, meaning that it must always be used behind a pointer like `&`. For an
/// owned version of this type, see [`RawDocumentBuf`].
///
/// Because the contents are validated during iteration instead of at creation time, format errors
/// can happen at any time during use.
///
/// Iterating over a [`RawDocument`] yields either an error or a key-value pair that borrows from
/// the original document without making any additional allocations.
///
/// Individual elements can be accessed using [`RawDocument::get`] or any of
/// the type-specific getters, such as [`RawDocument::get_object_id`] or
/// [`RawDocument::get_str`]. Note that accessing elements is an O(N) operation, as it
/// requires iterating through the document from the beginning to find the requested key.
#[derive(PartialEq, Eq)]
#[repr(transparent)]
pub struct RawDocument {
    data: [u8],
}

impl RawDocument {
    /// Constructs a new [`RawDocument`], validating _only_ the
    /// following invariants:
    ///   * `data` is at least five bytes long (the minimum for a valid BSON document)
    ///   * the initial four bytes of `data` accurately represent the length of the bytes as
    ///     required by the BSON spec.
    ///   * the last byte of `data` is a 0
    ///
    /// The elements themselves are not validated until they are iterated.
    ///
    /// ```
    /// # use bson_core::raw::RawDocument;
    /// let doc = RawDocument::from_bytes(b"\x05\0\0\0\0")?;
    /// assert!(doc.is_empty());
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn from_bytes<D: AsRef<[u8]> + ?Sized>(data: &D) -> Result<&RawDocument> {
        let data = data.as_ref();

        if data.len() < MIN_BSON_DOCUMENT_SIZE as usize {
            return Err(Error::malformed_value("document too short"));
        }

        let length = i32_from_slice(data)?;

        if length < 0 || data.len() != length as usize {
            return Err(Error::malformed_value(format!(
                "document length incorrect: prefix says {length}, buffer holds {}",
                data.len()
            )));
        }

        if data[data.len() - 1] != 0 {
            return Err(Error::malformed_value("document not null-terminated"));
        }

        Ok(RawDocument::new_unchecked(data))
    }

    /// Creates a new `RawDocument` referencing the provided data slice.
    pub(crate) fn new_unchecked<D: AsRef<[u8]> + ?Sized>(data: &D) -> &RawDocument {
        // SAFETY:
        //
        // Dereferencing a raw pointer requires unsafe due to the potential that the pointer is
        // null, dangling, or misaligned. We know the pointer is not null or dangling due to the
        // fact that it's created by a safe reference. Converting &[u8] to *const [u8] will be
        // properly aligned due to them being references to the same type, and converting *const
        // [u8] to *const RawDocument is aligned due to the fact that the only field in a
        // RawDocument is a [u8] and it is #[repr(transparent), meaning the structs are represented
        // identically at the byte level.
        unsafe { &*(data.as_ref() as *const [u8] as *const RawDocument) }
    }

    /// Creates a new [`RawDocumentBuf`] with an owned copy of the BSON bytes.
    pub fn to_raw_document_buf(&self) -> RawDocumentBuf {
        RawDocumentBuf::from_validated(&self.data)
    }

    /// An iterator over the decoded `(key, value)` pairs.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// An iterator over the elements, exposing offsets and undecoded payloads.
    pub fn iter_elements(&self) -> RawIter<'_> {
        RawIter::new(self)
    }

    /// Gets a reference to the value corresponding to the given key by iterating until the key is
    /// found.
    pub fn get(&self, key: impl AsRef<str>) -> Result<Option<RawBsonRef<'_>>> {
        match self.get_element(key)? {
            Some(element) => element.value().map(Some),
            None => Ok(None),
        }
    }

    /// Locates the first element with the given key. The comparison is on raw key bytes, so keys
    /// that are not valid UTF-8 are skipped rather than reported.
    pub fn get_element(&self, key: impl AsRef<str>) -> Result<Option<RawElement<'_>>> {
        let key = key.as_ref().as_bytes();
        for element in self.iter_elements() {
            let element = element?;
            if element.key_bytes() == key {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// Like [`RawDocument::get`], but compares keys ignoring ASCII case.
    pub fn get_ignore_case(&self, key: impl AsRef<str>) -> Result<Option<RawBsonRef<'_>>> {
        let key = key.as_ref().as_bytes();
        for element in self.iter_elements() {
            let element = element?;
            if element.key_bytes().eq_ignore_ascii_case(key) {
                return element.value().map(Some);
            }
        }
        Ok(None)
    }

    /// Follows a dotted path through embedded documents and arrays, e.g. `"a.b.0"`.
    ///
    /// Returns `None` if any segment is missing or if a segment other than the last names a
    /// value that is neither a document nor an array.
    ///
    /// ```
    /// # use bson_core::raw::RawDocumentBuf;
    /// let doc = RawDocumentBuf::from_json(r#"{ "a": { "b": [10, 20] } }"#)?;
    /// assert_eq!(doc.find_descendant("a.b.1")?.and_then(|v| v.as_i32()), Some(20));
    /// assert!(doc.find_descendant("a.c")?.is_none());
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn find_descendant(&self, path: impl AsRef<str>) -> Result<Option<RawBsonRef<'_>>> {
        let mut segments = path.as_ref().split('.');
        let mut value = match segments.next() {
            Some(first) => match self.get(first)? {
                Some(value) => value,
                None => return Ok(None),
            },
            None => return Ok(None),
        };
        for segment in segments {
            let doc = match value {
                RawBsonRef::Document(d) => d,
                RawBsonRef::Array(a) => a.as_doc(),
                _ => return Ok(None),
            };
            value = match doc.get(segment)? {
                Some(v) => v,
                None => return Ok(None),
            };
        }
        Ok(Some(value))
    }

    fn get_with<'a, T>(
        &'a self,
        key: impl AsRef<str>,
        expected_type: ElementType,
        f: impl FnOnce(RawBsonRef<'a>) -> Option<T>,
    ) -> Result<T> {
        let key = key.as_ref();

        let bson = self
            .get(key)
            .map_err(|e| e.with_key(key))?
            .ok_or_else(|| Error::value_access_not_present().with_key(key))?;
        match f(bson) {
            Some(t) => Ok(t),
            None => Err(
                Error::value_access_unexpected_type(bson.element_type(), expected_type)
                    .with_key(key),
            ),
        }
    }

    /// Gets the BSON double value corresponding to a given key or returns an error if the key is
    /// absent or corresponds to a value which isn't a double.
    pub fn get_f64(&self, key: impl AsRef<str>) -> Result<f64> {
        self.get_with(key, ElementType::Double, RawBsonRef::as_f64)
    }

    /// Gets a reference to the string value corresponding to a given key or returns an error if the
    /// key corresponds to a value which isn't a string.
    pub fn get_str(&self, key: impl AsRef<str>) -> Result<&'_ str> {
        self.get_with(key, ElementType::String, RawBsonRef::as_str)
    }

    /// Gets a reference to the document value corresponding to a given key or returns an error if
    /// the key corresponds to a value which isn't a document.
    pub fn get_document(&self, key: impl AsRef<str>) -> Result<&'_ RawDocument> {
        self.get_with(key, ElementType::EmbeddedDocument, RawBsonRef::as_document)
    }

    /// Gets a reference to the array value corresponding to a given key or returns an error if
    /// the key corresponds to a value which isn't an array.
    pub fn get_array(&self, key: impl AsRef<str>) -> Result<&'_ RawArray> {
        self.get_with(key, ElementType::Array, RawBsonRef::as_array)
    }

    pub fn get_binary(&self, key: impl AsRef<str>) -> Result<RawBinaryRef<'_>> {
        self.get_with(key, ElementType::Binary, RawBsonRef::as_binary)
    }

    pub fn get_object_id(&self, key: impl AsRef<str>) -> Result<ObjectId> {
        self.get_with(key, ElementType::ObjectId, RawBsonRef::as_object_id)
    }

    pub fn get_bool(&self, key: impl AsRef<str>) -> Result<bool> {
        self.get_with(key, ElementType::Boolean, RawBsonRef::as_bool)
    }

    pub fn get_datetime(&self, key: impl AsRef<str>) -> Result<DateTime> {
        self.get_with(key, ElementType::DateTime, RawBsonRef::as_datetime)
    }

    pub fn get_regex(&self, key: impl AsRef<str>) -> Result<RawRegexRef<'_>> {
        self.get_with(key, ElementType::RegularExpression, RawBsonRef::as_regex)
    }

    pub fn get_timestamp(&self, key: impl AsRef<str>) -> Result<Timestamp> {
        self.get_with(key, ElementType::Timestamp, RawBsonRef::as_timestamp)
    }

    pub fn get_i32(&self, key: impl AsRef<str>) -> Result<i32> {
        self.get_with(key, ElementType::Int32, RawBsonRef::as_i32)
    }

    pub fn get_i64(&self, key: impl AsRef<str>) -> Result<i64> {
        self.get_with(key, ElementType::Int64, RawBsonRef::as_i64)
    }

    /// The number of top-level elements. Fails if any element is corrupt.
    pub fn count_keys(&self) -> Result<usize> {
        self.iter_elements()
            .try_fold(0, |count, element| element.map(|_| count + 1))
    }

    /// Whether an element with the given key exists. A corrupt document reports only the keys
    /// before the corruption.
    pub fn has_field(&self, key: impl AsRef<str>) -> bool {
        matches!(self.get_element(key), Ok(Some(_)))
    }

    /// Whether the document has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.len() == MIN_BSON_DOCUMENT_SIZE as usize
    }

    /// Orders documents by encoded length, then byte-wise.
    pub fn compare(&self, other: &RawDocument) -> Ordering {
        self.data
            .len()
            .cmp(&other.data.len())
            .then_with(|| self.data.cmp(&other.data))
    }

    /// Copies every top-level element whose key is not in `exclude` into a new document,
    /// preserving order.
    pub fn copy_excluding(&self, exclude: &[&str]) -> Result<RawDocumentBuf> {
        let mut copy = RawDocumentBuf::new();
        for element in self.iter_elements() {
            let element = element?;
            if exclude.iter().any(|k| k.as_bytes() == element.key_bytes()) {
                continue;
            }
            copy.append_element(&element)?;
        }
        Ok(copy)
    }

    /// Returns the bytes of this document.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDocument")
            .field("data", &hex::encode(&self.data))
            .finish()
    }
}

impl AsRef<RawDocument> for RawDocument {
    fn as_ref(&self) -> &RawDocument {
        self
    }
}

impl AsRef<[u8]> for RawDocument {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl ToOwned for RawDocument {
    type Owned = RawDocumentBuf;

    fn to_owned(&self) -> Self::Owned {
        self.to_raw_document_buf()
    }
}

impl<'a> From<&'a RawDocument> for Cow<'a, RawDocument> {
    fn from(rdr: &'a RawDocument) -> Self {
        Cow::Borrowed(rdr)
    }
}

impl<'a> IntoIterator for &'a RawDocument {
    type IntoIter = Iter<'a>;
    type Item = Result<(&'a str, RawBsonRef<'a>)>;

    fn into_iter(self) -> Iter<'a> {
        Iter::new(self)
    }
}
