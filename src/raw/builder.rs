//! Builders for documents and arrays nested inside a document that is still being written.

use crate::{
    error::Result,
    raw::{
        encode::{self, Encoder},
        RawBsonRef,
        RawDocument,
        RawElement,
    },
    spec::ElementType,
    DateTime,
};

/// An open embedded document.
///
/// The builder holds the only mutable borrow of the document it was begun from, so the parent
/// cannot be appended to while the child is open. The child is closed by [`DocumentBuilder::end`]
/// or by dropping the builder; either way its bytes are already part of the parent.
///
/// ```
/// use bson_core::raw::RawDocumentBuf;
///
/// let mut doc = RawDocumentBuf::new();
/// {
///     let mut x = doc.append_document_begin("x")?;
///     x.append("y", 5)?;
///     let mut list = x.append_array_begin("list")?;
///     list.push("a")?;
///     list.push("b")?;
/// }
/// assert_eq!(doc.find_descendant("x.list.1")?.and_then(|v| v.as_str()), Some("b"));
/// # Ok::<(), bson_core::error::Error>(())
/// ```
pub struct DocumentBuilder<'a> {
    encoder: &'a mut dyn Encoder,
    depth: usize,
}

impl<'a> DocumentBuilder<'a> {
    pub(crate) fn begin(
        encoder: &'a mut dyn Encoder,
        parent_depth: usize,
        element_type: ElementType,
        key: &str,
    ) -> Result<Self> {
        encoder.begin_child(parent_depth, element_type, key)?;
        Ok(Self {
            encoder,
            depth: parent_depth + 1,
        })
    }

    /// Appends a key/value pair to the child document.
    pub fn append<'v>(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<RawBsonRef<'v>>,
    ) -> Result<()> {
        encode::append_value(self.encoder, self.depth, key.as_ref(), value.into())
    }

    /// Appends `value` as a string, or a null if it is `None`.
    pub fn append_str_or_null(&mut self, key: impl AsRef<str>, value: Option<&str>) -> Result<()> {
        match value {
            Some(s) => self.append(key, s),
            None => self.append(key, RawBsonRef::Null),
        }
    }

    /// Copies an element read from another document, keeping its key.
    pub fn append_element(&mut self, element: &RawElement<'_>) -> Result<()> {
        encode::append_element(self.encoder, self.depth, None, element)
    }

    /// Copies an element read from another document under a new key.
    pub fn append_element_as(
        &mut self,
        key: impl AsRef<str>,
        element: &RawElement<'_>,
    ) -> Result<()> {
        encode::append_element(self.encoder, self.depth, Some(key.as_ref()), element)
    }

    pub fn append_now_utc(&mut self, key: impl AsRef<str>) -> Result<()> {
        self.append(key, DateTime::now())
    }

    /// Opens a document nested in this one.
    pub fn append_document_begin(&mut self, key: impl AsRef<str>) -> Result<DocumentBuilder<'_>> {
        DocumentBuilder::begin(
            &mut *self.encoder,
            self.depth,
            ElementType::EmbeddedDocument,
            key.as_ref(),
        )
    }

    /// Opens an array nested in this document.
    pub fn append_array_begin(&mut self, key: impl AsRef<str>) -> Result<ArrayBuilder<'_>> {
        DocumentBuilder::begin(&mut *self.encoder, self.depth, ElementType::Array, key.as_ref())
            .map(ArrayBuilder::new)
    }

    /// The child document as written so far.
    pub fn as_document(&self) -> &RawDocument {
        RawDocument::new_unchecked(self.encoder.frame_bytes(self.depth))
    }

    /// Closes the child document.
    pub fn end(self) {}
}

impl Drop for DocumentBuilder<'_> {
    fn drop(&mut self) {
        // Fails only if a grandchild was leaked, in which case this frame stays open too.
        let _ = self.encoder.end_child(self.depth);
    }
}

/// An open array. Elements are keyed `"0"`, `"1"`, ... in the order they are pushed.
pub struct ArrayBuilder<'a> {
    inner: DocumentBuilder<'a>,
    len: usize,
}

impl<'a> ArrayBuilder<'a> {
    pub(crate) fn new(inner: DocumentBuilder<'a>) -> Self {
        Self { inner, len: 0 }
    }

    fn key(&self) -> String {
        self.len.to_string()
    }

    /// Appends a value at the next index.
    pub fn push<'v>(&mut self, value: impl Into<RawBsonRef<'v>>) -> Result<()> {
        let key = self.key();
        self.inner.append(key, value)?;
        self.len += 1;
        Ok(())
    }

    /// Copies the value of an element read from another document to the next index.
    pub fn push_element(&mut self, element: &RawElement<'_>) -> Result<()> {
        let key = self.key();
        self.inner.append_element_as(key, element)?;
        self.len += 1;
        Ok(())
    }

    /// Opens a document at the next index.
    pub fn push_document_begin(&mut self) -> Result<DocumentBuilder<'_>> {
        let key = self.key();
        let child = DocumentBuilder::begin(
            &mut *self.inner.encoder,
            self.inner.depth,
            ElementType::EmbeddedDocument,
            &key,
        )?;
        self.len += 1;
        Ok(child)
    }

    /// Opens an array at the next index.
    pub fn push_array_begin(&mut self) -> Result<ArrayBuilder<'_>> {
        let key = self.key();
        let child = DocumentBuilder::begin(
            &mut *self.inner.encoder,
            self.inner.depth,
            ElementType::Array,
            &key,
        )?;
        self.len += 1;
        Ok(ArrayBuilder::new(child))
    }

    /// The number of values pushed so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The array as written so far, viewed as a document.
    pub fn as_document(&self) -> &RawDocument {
        self.inner.as_document()
    }

    /// Closes the array.
    pub fn end(self) {}
}
