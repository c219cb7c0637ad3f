use crate::{
    error::{Error, Result},
    oid::ObjectId,
    raw::{
        f64_from_slice,
        i32_from_slice,
        i64_from_slice,
        read_array,
        read_nullterminated,
        try_to_str,
        RawArray,
        RawBinaryRef,
        RawBsonRef,
        RawDbPointerRef,
        RawDocument,
        RawJavaScriptCodeWithScopeRef,
        RawRegexRef,
        MIN_BSON_DOCUMENT_SIZE,
        MIN_CODE_WITH_SCOPE_SIZE,
    },
    spec::{BinarySubtype, ElementType},
    DateTime,
    Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    OnField,
    Exhausted,
    Invalid,
}

/// An iterator over the elements of a document that validates each element's framing as it is
/// reached, yielding [`RawElement`]s that borrow from the document.
///
/// The iterator never reads outside the bytes it was bound to. Once an element fails to
/// validate, the error is yielded once, [`RawIter::error_offset`] records where the element
/// started, and every later call to `next` returns `None`.
#[derive(Clone)]
pub struct RawIter<'a> {
    data: &'a [u8],
    offset: usize,
    state: State,
    error_offset: Option<usize>,
    pending: Option<Error>,
}

impl<'a> RawIter<'a> {
    pub(crate) fn new(doc: &'a RawDocument) -> Self {
        Self {
            data: doc.as_bytes(),
            offset: 4,
            state: State::Fresh,
            error_offset: None,
            pending: None,
        }
    }

    /// Bind an iterator to arbitrary bytes. If they are not framed as a document (too short, a
    /// length prefix that disagrees with the slice, or no terminating nul), the iterator is
    /// invalid from the start with an error offset of zero.
    pub fn from_bytes(data: &'a [u8]) -> Self {
        match RawDocument::from_bytes(data) {
            Ok(doc) => Self::new(doc),
            Err(e) => Self {
                data,
                offset: 0,
                state: State::Invalid,
                error_offset: Some(0),
                pending: Some(e.with_offset(0)),
            },
        }
    }

    /// The offset of the element that failed to validate, if any.
    pub fn error_offset(&self) -> Option<usize> {
        self.error_offset
    }

    /// Whether iteration reached the end of the document without error.
    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// Whether the iterator has not yet been advanced.
    pub fn is_fresh(&self) -> bool {
        self.state == State::Fresh
    }

    fn decode(&self, start: usize) -> Result<RawElement<'a>> {
        // The last byte is the document's terminator and never part of an element.
        let end = self.data.len() - 1;

        let tag = self.data[start];
        let element_type = ElementType::from(tag)
            .ok_or_else(|| Error::malformed_value(format!("invalid tag: {tag:#04x}")))?;

        let key_start = start + 1;
        let key_len = read_nullterminated(&self.data[key_start..end])
            .map_err(|_| Error::malformed_value("key is not null terminated"))?
            .len();

        let value_start = key_start + key_len + 1;
        let value_len = self
            .value_len(element_type, value_start, end)
            .map_err(|e| {
                e.with_key(String::from_utf8_lossy(
                    &self.data[key_start..key_start + key_len],
                ))
            })?;

        Ok(RawElement {
            data: self.data,
            start,
            key_len,
            element_type,
            value_start,
            value_len,
        })
    }

    fn fits(&self, at: usize, limit: usize, len: usize) -> Result<usize> {
        if len > limit - at {
            return Err(Error::malformed_value(format!(
                "length exceeds remaining length of buffer: {} vs {}",
                len,
                limit - at
            )));
        }
        Ok(len)
    }

    fn read_len(&self, at: usize, limit: usize) -> Result<i32> {
        self.fits(at, limit, 4)?;
        i32_from_slice(&self.data[at..])
    }

    /// The length of a length-prefixed, nul-terminated string starting at `at`, including its
    /// prefix.
    fn string_len(&self, at: usize, limit: usize) -> Result<usize> {
        let len = self.read_len(at, limit)?;
        if len <= 0 {
            return Err(Error::malformed_value(format!(
                "string length must be positive, got {len}"
            )));
        }
        let total = self.fits(at, limit, 4 + len as usize)?;
        if self.data[at + total - 1] != 0 {
            return Err(Error::malformed_value("string not null terminated"));
        }
        Ok(total)
    }

    fn document_len(&self, at: usize, limit: usize) -> Result<usize> {
        let len = self.read_len(at, limit)?;
        if len < MIN_BSON_DOCUMENT_SIZE {
            return Err(Error::malformed_value(format!(
                "document too small: {len} bytes"
            )));
        }
        let total = self.fits(at, limit, len as usize)?;
        if self.data[at + total - 1] != 0 {
            return Err(Error::malformed_value("document not null terminated"));
        }
        Ok(total)
    }

    fn value_len(&self, element_type: ElementType, at: usize, end: usize) -> Result<usize> {
        match element_type {
            ElementType::Double
            | ElementType::DateTime
            | ElementType::Int64
            | ElementType::Timestamp => self.fits(at, end, 8),
            ElementType::Int32 => self.fits(at, end, 4),
            ElementType::ObjectId => self.fits(at, end, 12),
            ElementType::Boolean => {
                self.fits(at, end, 1)?;
                match self.data[at] {
                    0 | 1 => Ok(1),
                    b => Err(Error::malformed_value(format!("invalid boolean byte: {b}"))),
                }
            }
            ElementType::Null
            | ElementType::Undefined
            | ElementType::MinKey
            | ElementType::MaxKey => Ok(0),
            ElementType::String | ElementType::JavaScriptCode | ElementType::Symbol => {
                self.string_len(at, end)
            }
            ElementType::EmbeddedDocument | ElementType::Array => self.document_len(at, end),
            ElementType::Binary => {
                let len = self.read_len(at, end)?;
                if len < 0 {
                    return Err(Error::malformed_value(format!(
                        "binary length must not be negative, got {len}"
                    )));
                }
                let len = len as usize;
                let total = self.fits(at, end, 4 + 1 + len)?;
                if let BinarySubtype::BinaryOld = BinarySubtype::from(self.data[at + 4]) {
                    if len < 4 {
                        return Err(Error::malformed_value(
                            "old binary subtype has no inner declared length",
                        ));
                    }
                    let inner = i32_from_slice(&self.data[at + 5..])?;
                    if inner < 0 || inner as usize + 4 != len {
                        return Err(Error::malformed_value(
                            "old binary subtype has wrong inner declared length",
                        ));
                    }
                }
                Ok(total)
            }
            ElementType::RegularExpression => {
                let pattern = read_nullterminated(&self.data[at..end])?.len();
                let options = read_nullterminated(&self.data[at + pattern + 1..end])?.len();
                Ok(pattern + 1 + options + 1)
            }
            ElementType::DbPointer => {
                let namespace = self.string_len(at, end)?;
                self.fits(at, end, namespace + 12)
            }
            ElementType::JavaScriptCodeWithScope => {
                let len = self.read_len(at, end)?;
                if len < MIN_CODE_WITH_SCOPE_SIZE {
                    return Err(Error::malformed_value(format!(
                        "code with scope length too small: {len}"
                    )));
                }
                let total = self.fits(at, end, len as usize)?;
                let limit = at + total;
                let code = self.string_len(at + 4, limit)?;
                let scope = self.document_len(at + 4 + code, limit)?;
                if 4 + code + scope != total {
                    return Err(Error::malformed_value(format!(
                        "code with scope length mismatch: declared {total}, actual {}",
                        4 + code + scope
                    )));
                }
                Ok(total)
            }
        }
    }
}

impl<'a> Iterator for RawIter<'a> {
    type Item = Result<RawElement<'a>>;

    fn next(&mut self) -> Option<Result<RawElement<'a>>> {
        if let Some(error) = self.pending.take() {
            return Some(Err(error));
        }
        match self.state {
            State::Exhausted | State::Invalid => return None,
            State::Fresh | State::OnField => {}
        }

        if self.offset == self.data.len() - 1 {
            self.state = State::Exhausted;
            return None;
        }

        match self.decode(self.offset) {
            Ok(element) => {
                self.offset = element.end();
                self.state = State::OnField;
                Some(Ok(element))
            }
            Err(error) => {
                self.state = State::Invalid;
                self.error_offset = Some(self.offset);
                Some(Err(error.with_offset(self.offset)))
            }
        }
    }
}

/// A framing-validated element of a document.
///
/// Offsets are relative to the start of the document the element was read from.
#[derive(Clone, Copy)]
pub struct RawElement<'a> {
    data: &'a [u8],
    start: usize,
    key_len: usize,
    element_type: ElementType,
    value_start: usize,
    value_len: usize,
}

impl<'a> RawElement<'a> {
    /// The element's key, checked to be valid UTF-8.
    pub fn key(&self) -> Result<&'a str> {
        try_to_str(self.key_bytes())
    }

    /// The raw bytes of the element's key, without the nul terminator.
    pub fn key_bytes(&self) -> &'a [u8] {
        &self.data[self.start + 1..self.start + 1 + self.key_len]
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The offset of the element's type byte.
    pub fn offset(&self) -> usize {
        self.start
    }

    /// The offset of the element's payload.
    pub fn value_offset(&self) -> usize {
        self.value_start
    }

    /// The length of the whole element: type byte, key and payload.
    pub fn len(&self) -> usize {
        self.end() - self.start
    }

    pub(crate) fn end(&self) -> usize {
        self.value_start + self.value_len
    }

    /// The encoded payload, exactly as it appears in the document.
    pub fn value_bytes(&self) -> &'a [u8] {
        &self.data[self.value_start..self.end()]
    }

    /// The encoded element: type byte, key and payload.
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.data[self.start..self.end()]
    }

    fn str_at(&self, at: usize) -> Result<&'a str> {
        let len = i32_from_slice(&self.data[at..])? as usize;
        try_to_str(&self.data[at + 4..at + 4 + len - 1])
    }

    /// Decode the payload. The framing was checked when the element was reached, so this fails
    /// only on invalid UTF-8 in a string payload.
    pub fn value(&self) -> Result<RawBsonRef<'a>> {
        let at = self.value_start;
        let bytes = self.value_bytes();
        let value = match self.element_type {
            ElementType::Double => RawBsonRef::Double(f64_from_slice(bytes)?),
            ElementType::String => RawBsonRef::String(self.str_at(at)?),
            ElementType::EmbeddedDocument => {
                RawBsonRef::Document(RawDocument::new_unchecked(bytes))
            }
            ElementType::Array => {
                RawBsonRef::Array(RawArray::from_doc(RawDocument::new_unchecked(bytes)))
            }
            ElementType::Binary => {
                let subtype = BinarySubtype::from(bytes[4]);
                let data = match subtype {
                    BinarySubtype::BinaryOld => &bytes[9..],
                    _ => &bytes[5..],
                };
                RawBsonRef::Binary(RawBinaryRef {
                    subtype,
                    bytes: data,
                })
            }
            ElementType::Undefined => RawBsonRef::Undefined,
            ElementType::ObjectId => RawBsonRef::ObjectId(ObjectId::from_bytes(read_array(bytes)?)),
            ElementType::Boolean => RawBsonRef::Boolean(bytes[0] == 1),
            ElementType::DateTime => {
                RawBsonRef::DateTime(DateTime::from_millis(i64_from_slice(bytes)?))
            }
            ElementType::Null => RawBsonRef::Null,
            ElementType::RegularExpression => {
                let pattern = read_nullterminated(bytes)?;
                let options = read_nullterminated(&bytes[pattern.len() + 1..])?;
                RawBsonRef::RegularExpression(RawRegexRef {
                    pattern: try_to_str(pattern)?,
                    options: try_to_str(options)?,
                })
            }
            ElementType::DbPointer => {
                let namespace = self.str_at(at)?;
                let id_at = 4 + namespace.len() + 1;
                RawBsonRef::DbPointer(RawDbPointerRef {
                    namespace,
                    id: ObjectId::from_bytes(read_array(&bytes[id_at..])?),
                })
            }
            ElementType::JavaScriptCode => RawBsonRef::JavaScriptCode(self.str_at(at)?),
            ElementType::Symbol => RawBsonRef::Symbol(self.str_at(at)?),
            ElementType::JavaScriptCodeWithScope => {
                let code = self.str_at(at + 4)?;
                let scope_start = 4 + 4 + code.len() + 1;
                RawBsonRef::JavaScriptCodeWithScope(RawJavaScriptCodeWithScopeRef {
                    code,
                    scope: RawDocument::new_unchecked(&bytes[scope_start..]),
                })
            }
            ElementType::Int32 => RawBsonRef::Int32(i32_from_slice(bytes)?),
            ElementType::Timestamp => {
                RawBsonRef::Timestamp(Timestamp::from_le_bytes(read_array(bytes)?))
            }
            ElementType::Int64 => RawBsonRef::Int64(i64_from_slice(bytes)?),
            ElementType::MinKey => RawBsonRef::MinKey,
            ElementType::MaxKey => RawBsonRef::MaxKey,
        };
        Ok(value)
    }
}

impl std::fmt::Debug for RawElement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawElement")
            .field("key", &String::from_utf8_lossy(self.key_bytes()))
            .field("element_type", &self.element_type)
            .field("offset", &self.start)
            .field("len", &self.len())
            .finish()
    }
}

/// An iterator over the document's entries, yielding decoded `(key, value)` pairs.
pub struct Iter<'a> {
    inner: RawIter<'a>,
    failed: bool,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(doc: &'a RawDocument) -> Self {
        Self {
            inner: RawIter::new(doc),
            failed: false,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<(&'a str, RawBsonRef<'a>)>;

    fn next(&mut self) -> Option<Result<(&'a str, RawBsonRef<'a>)>> {
        if self.failed {
            return None;
        }
        let result = self.inner.next()?.and_then(|element| {
            let key = element.key().map_err(|e| e.with_offset(element.offset()))?;
            let value = element
                .value()
                .map_err(|e| e.with_key(key).with_offset(element.offset()))?;
            Ok((key, value))
        });
        self.failed = result.is_err();
        Some(result)
    }
}
