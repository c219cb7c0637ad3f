use std::{
    borrow::{Borrow, Cow},
    ops::Deref,
};

use super::{
    buffer::{grow_target, Arena, Storage},
    encode::{self, Encoder, Tape},
    ArrayBuilder,
    DocumentBuilder,
    Iter,
    RawBsonRef,
    RawDocument,
    RawElement,
    EMPTY_DOCUMENT,
    INLINE_CAPACITY,
};
use crate::{
    error::{Error, ErrorKind, Result},
    spec::ElementType,
    DateTime,
};

/// An owned BSON document (akin to [`std::path::PathBuf`]), backed by a buffer of raw BSON bytes.
///
/// Small documents are stored inline without a heap allocation; once a document outgrows
/// [`INLINE_CAPACITY`](super::INLINE_CAPACITY) bytes it moves to the heap and from then on grows
/// to the next power of two. Every append is all-or-nothing: a refused append (too large, a key
/// containing a nul byte, a read-only document) leaves the bytes unchanged.
///
/// ```
/// use bson_core::raw::RawDocumentBuf;
///
/// let doc = RawDocumentBuf::from_bytes(b"\x13\x00\x00\x00\x02hi\x00\x06\x00\x00\x00y'all\x00\x00".to_vec())?;
/// let mut iter = doc.iter();
/// let (key, value) = iter.next().unwrap()?;
/// assert_eq!(key, "hi");
/// assert_eq!(value.as_str(), Some("y'all"));
/// assert!(iter.next().is_none());
/// # Ok::<(), bson_core::error::Error>(())
/// ```
///
/// This type implements `Deref` to [`RawDocument`], meaning that all methods on [`RawDocument`] are
/// available on [`RawDocumentBuf`] values as well. This includes [`RawDocument::get`] or any of the
/// type-specific getters, such as [`RawDocument::get_object_id`] or [`RawDocument::get_str`]. Note
/// that accessing elements is an O(N) operation, as it requires iterating through the document from
/// the beginning to find the requested key.
#[derive(Clone)]
pub struct RawDocumentBuf {
    tape: Tape<Storage>,
}

impl RawDocumentBuf {
    /// Creates a new, empty [`RawDocumentBuf`].
    pub fn new() -> RawDocumentBuf {
        Self {
            tape: Tape::new(Storage::inline(&EMPTY_DOCUMENT), 0),
        }
    }

    /// Constructs a new [`RawDocumentBuf`], validating _only_ the
    /// following invariants:
    ///   * `data` is at least five bytes long (the minimum for a valid BSON document)
    ///   * the initial four bytes of `data` accurately represent the length of the bytes as
    ///     required by the BSON spec.
    ///   * the last byte of `data` is a 0
    ///
    /// Note that the internal structure of the bytes representing the
    /// BSON elements is _not_ validated at all by this method. If the
    /// bytes do not conform to the BSON spec, then method calls on
    /// the RawDocument will return Errors where appropriate.
    ///
    /// ```
    /// # use bson_core::raw::RawDocumentBuf;
    /// let doc = RawDocumentBuf::from_bytes(b"\x05\0\0\0\0".to_vec())?;
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn from_bytes(mut data: Vec<u8>) -> Result<RawDocumentBuf> {
        RawDocument::from_bytes(data.as_slice())?;
        if data.len() <= INLINE_CAPACITY {
            return Ok(Self::from_validated(&data));
        }
        let target = grow_target(data.len());
        if data.capacity() < target {
            data.reserve_exact(target - data.len());
        }
        Ok(Self {
            tape: Tape::new(Storage::Heap(data), 0),
        })
    }

    /// A read-only document over memory it does not own. Appends and overwrites are refused
    /// with [`ErrorKind::ReadOnly`].
    pub fn from_static(data: &'static [u8]) -> Result<RawDocumentBuf> {
        RawDocument::from_bytes(data)?;
        Ok(Self {
            tape: Tape::new(Storage::Static(data), 0),
        })
    }

    /// Copies bytes already known to be framed as a document.
    pub(crate) fn from_validated(data: &[u8]) -> RawDocumentBuf {
        let storage = if data.len() <= INLINE_CAPACITY {
            Storage::inline(data)
        } else {
            let mut heap = Vec::with_capacity(grow_target(data.len()));
            heap.extend_from_slice(data);
            Storage::Heap(heap)
        };
        Self {
            tape: Tape::new(storage, 0),
        }
    }

    /// Gets an iterator over the elements in the [`RawDocumentBuf`], which yields
    /// `Result<(&str, RawBsonRef<'_>)>`.
    ///
    /// There is no owning iterator for [`RawDocumentBuf`]. If you need ownership over
    /// elements that might need to allocate, you must explicitly convert
    /// them to owned types yourself.
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Return the contained data as a `Vec<u8>`
    ///
    /// ```
    /// use bson_core::raw::RawDocumentBuf;
    ///
    /// let doc = RawDocumentBuf::new();
    /// assert_eq!(doc.into_bytes(), b"\x05\x00\x00\x00\x00".to_vec());
    /// ```
    pub fn into_bytes(self) -> Vec<u8> {
        self.tape.into_arena().into_vec()
    }

    /// The number of bytes the document can grow to without reallocating.
    pub fn capacity(&self) -> usize {
        self.tape.arena().capacity()
    }

    /// Whether the document is stored inline rather than on the heap.
    pub fn is_inline(&self) -> bool {
        self.tape.arena().is_inline()
    }

    /// Whether the document is backed by memory it does not own.
    pub fn is_read_only(&self) -> bool {
        !self.tape.arena().is_writable()
    }

    /// The document's encoder, for builders that track their own nesting depth.
    pub(crate) fn encoder(&mut self) -> &mut dyn Encoder {
        &mut self.tape
    }

    /// Appends a key/value pair to the end of the document.
    ///
    /// ```
    /// use bson_core::raw::{RawArrayBuf, RawDocumentBuf};
    ///
    /// let mut doc = RawDocumentBuf::new();
    /// doc.append("a string", "some string")?;
    /// doc.append("an integer", 12_i32)?;
    ///
    /// let mut subdoc = RawDocumentBuf::new();
    /// subdoc.append("a key", true)?;
    /// doc.append("a document", &subdoc)?;
    ///
    /// let mut array = RawArrayBuf::new();
    /// array.push(12_i32)?;
    /// doc.append("an array", &array)?;
    ///
    /// assert_eq!(doc.get_document("a document")?.get_bool("a key")?, true);
    /// assert_eq!(doc.get_array("an array")?.get_i32(0)?, 12);
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn append<'a>(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<RawBsonRef<'a>>,
    ) -> Result<()> {
        encode::append_value(&mut self.tape, 0, key.as_ref(), value.into())
    }

    /// Appends `value` as a string, or a null if it is `None`.
    pub fn append_str_or_null(&mut self, key: impl AsRef<str>, value: Option<&str>) -> Result<()> {
        match value {
            Some(s) => self.append(key, s),
            None => self.append(key, RawBsonRef::Null),
        }
    }

    /// Copies an element read from another document, keeping its key and encoded payload.
    pub fn append_element(&mut self, element: &RawElement<'_>) -> Result<()> {
        encode::append_element(&mut self.tape, 0, None, element)
    }

    /// Copies an element read from another document under a new key.
    pub fn append_element_as(
        &mut self,
        key: impl AsRef<str>,
        element: &RawElement<'_>,
    ) -> Result<()> {
        encode::append_element(&mut self.tape, 0, Some(key.as_ref()), element)
    }

    /// Appends the current time as a UTC datetime.
    pub fn append_now_utc(&mut self, key: impl AsRef<str>) -> Result<()> {
        self.append(key, DateTime::now())
    }

    /// Opens an embedded document under `key`. The document cannot be appended to until the
    /// returned builder is ended or dropped.
    pub fn append_document_begin(&mut self, key: impl AsRef<str>) -> Result<DocumentBuilder<'_>> {
        DocumentBuilder::begin(
            &mut self.tape,
            0,
            ElementType::EmbeddedDocument,
            key.as_ref(),
        )
    }

    /// Opens an array under `key`.
    pub fn append_array_begin(&mut self, key: impl AsRef<str>) -> Result<ArrayBuilder<'_>> {
        DocumentBuilder::begin(&mut self.tape, 0, ElementType::Array, key.as_ref())
            .map(ArrayBuilder::new)
    }

    /// Appends every element of `other`, in order. Either all of them are appended or none.
    pub fn concat(&mut self, other: &RawDocument) -> Result<()> {
        for element in other.iter_elements() {
            element?;
        }
        let bytes = other.as_bytes();
        self.tape
            .append_raw_elements(0, &bytes[4..bytes.len() - 1])
    }

    /// Replaces the value of the first element with `key` in place. Only fixed-width values can
    /// be overwritten (doubles, booleans, datetimes, int32s, int64s, timestamps and object ids),
    /// and the new value must have the same type as the old one, so the document's length never
    /// changes.
    ///
    /// ```
    /// use bson_core::raw::RawDocumentBuf;
    ///
    /// let mut doc = RawDocumentBuf::new();
    /// doc.append("n", 1)?;
    /// doc.overwrite("n", 42)?;
    /// assert_eq!(doc.get_i32("n")?, 42);
    /// assert!(doc.overwrite("n", 42_i64).is_err());
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn overwrite<'a>(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<RawBsonRef<'a>>,
    ) -> Result<()> {
        let key = key.as_ref();
        let value = value.into();
        if self.is_read_only() {
            return Err(ErrorKind::ReadOnly.into());
        }

        let (at, actual) = match self.get_element(key)? {
            Some(element) => (element.value_offset(), element.element_type()),
            None => return Err(Error::value_access_not_present().with_key(key)),
        };
        let expected = value.element_type();
        let bytes = match fixed_width_bytes(value) {
            Some(bytes) if actual == expected => bytes,
            _ => return Err(Error::value_access_unexpected_type(actual, expected).with_key(key)),
        };
        self.tape.overwrite(at, &bytes)
    }
}

/// The payload of a fixed-width value.
fn fixed_width_bytes(value: RawBsonRef<'_>) -> Option<Vec<u8>> {
    let bytes = match value {
        RawBsonRef::Double(d) => d.to_le_bytes().to_vec(),
        RawBsonRef::Boolean(b) => vec![b as u8],
        RawBsonRef::DateTime(dt) => dt.timestamp_millis().to_le_bytes().to_vec(),
        RawBsonRef::Int32(i) => i.to_le_bytes().to_vec(),
        RawBsonRef::Int64(i) => i.to_le_bytes().to_vec(),
        RawBsonRef::Timestamp(ts) => ts.to_le_bytes().to_vec(),
        RawBsonRef::ObjectId(oid) => oid.bytes().to_vec(),
        _ => return None,
    };
    debug_assert_eq!(value.element_type().fixed_width(), Some(bytes.len()));
    Some(bytes)
}

impl Default for RawDocumentBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RawDocumentBuf {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for RawDocumentBuf {}

impl std::fmt::Debug for RawDocumentBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDocumentBuf")
            .field("data", &hex::encode(self.as_bytes()))
            .field("inline", &self.is_inline())
            .finish()
    }
}

impl<'a> From<RawDocumentBuf> for Cow<'a, RawDocument> {
    fn from(rd: RawDocumentBuf) -> Self {
        Cow::Owned(rd)
    }
}

impl<'a> From<&'a RawDocumentBuf> for Cow<'a, RawDocument> {
    fn from(rd: &'a RawDocumentBuf) -> Self {
        Cow::Borrowed(rd.as_ref())
    }
}

impl TryFrom<Vec<u8>> for RawDocumentBuf {
    type Error = Error;

    fn try_from(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes(data)
    }
}

impl<'a> IntoIterator for &'a RawDocumentBuf {
    type IntoIter = Iter<'a>;
    type Item = Result<(&'a str, RawBsonRef<'a>)>;

    fn into_iter(self) -> Iter<'a> {
        Iter::new(self)
    }
}

impl AsRef<RawDocument> for RawDocumentBuf {
    fn as_ref(&self) -> &RawDocument {
        RawDocument::new_unchecked(self.tape.as_bytes())
    }
}

impl Deref for RawDocumentBuf {
    type Target = RawDocument;

    fn deref(&self) -> &Self::Target {
        RawDocument::new_unchecked(self.tape.as_bytes())
    }
}

impl Borrow<RawDocument> for RawDocumentBuf {
    fn borrow(&self) -> &RawDocument {
        self.deref()
    }
}
