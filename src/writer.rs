//! Writing a sequence of documents back to back into a caller-owned buffer.

use tracing::debug;

use crate::{
    error::{ErrorKind, Result},
    raw::{
        buffer::{grow_target, Arena},
        encode::{self, Tape},
        ArrayBuilder,
        DocumentBuilder,
        RawBsonRef,
        RawDocument,
    },
    spec::ElementType,
};

/// Whether a [`Writer`] may reallocate the buffer it writes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Growth {
    /// Grow the buffer to the next power of two whenever it runs out of room.
    Growable,

    /// Never reallocate. Appends that do not fit in the buffer's current capacity fail with
    /// [`ErrorKind::InsufficientCapacity`].
    Fixed,
}

/// The part of a writer's buffer documents are written into.
struct VecArena<'v> {
    vec: &'v mut Vec<u8>,
    growth: Growth,
}

impl Arena for VecArena<'_> {
    fn bytes(&self) -> &[u8] {
        self.vec
    }

    fn reserve_total(&mut self, total: usize) -> Result<()> {
        let capacity = self.vec.capacity();
        if total <= capacity {
            return Ok(());
        }
        match self.growth {
            Growth::Fixed => Err(ErrorKind::InsufficientCapacity {
                requested: total,
                capacity,
            }
            .into()),
            Growth::Growable => {
                let target = grow_target(total);
                debug!(from = capacity, to = target, "growing writer buffer");
                self.vec.reserve_exact(target - self.vec.len());
                Ok(())
            }
        }
    }

    fn truncate(&mut self, len: usize) {
        self.vec.truncate(len);
    }

    fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.vec.extend_from_slice(bytes);
    }

    fn patch(&mut self, at: usize, bytes: &[u8]) {
        self.vec[at..at + bytes.len()].copy_from_slice(bytes);
    }
}

/// Writes documents one after another into a `Vec<u8>` it borrows, starting at the vector's
/// current length.
///
/// Only one document can be open at a time: [`Writer::begin`] borrows the writer until the
/// returned [`WriterDocument`] is ended, rolled back or dropped.
///
/// ```
/// use bson_core::{raw::RawDocument, writer::Writer};
///
/// let mut buf = Vec::new();
/// let mut writer = Writer::new(&mut buf);
///
/// let mut doc = writer.begin()?;
/// doc.append("n", 1)?;
/// doc.end();
///
/// let mut doc = writer.begin()?;
/// doc.append("n", 2)?;
/// doc.rollback();
///
/// assert_eq!(writer.len(), 12);
/// let doc = RawDocument::from_bytes(&buf)?;
/// assert_eq!(doc.get_i32("n")?, 1);
/// # Ok::<(), bson_core::error::Error>(())
/// ```
pub struct Writer<'b> {
    buf: &'b mut Vec<u8>,
    growth: Growth,
    start: usize,
    /// End of the last committed document.
    offset: usize,
}

impl<'b> Writer<'b> {
    /// A writer that grows `buf` as needed.
    pub fn new(buf: &'b mut Vec<u8>) -> Self {
        Self::with_growth(buf, Growth::Growable)
    }

    /// A writer that never grows `buf` beyond its current capacity.
    pub fn fixed(buf: &'b mut Vec<u8>) -> Self {
        Self::with_growth(buf, Growth::Fixed)
    }

    pub fn with_growth(buf: &'b mut Vec<u8>, growth: Growth) -> Self {
        let start = buf.len();
        Self {
            buf,
            growth,
            start,
            offset: start,
        }
    }

    /// The number of bytes of committed documents written so far.
    pub fn len(&self) -> usize {
        self.offset - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new, empty document after the last committed one.
    pub fn begin(&mut self) -> Result<WriterDocument<'_>> {
        self.buf.truncate(self.offset);
        let arena = VecArena {
            vec: &mut *self.buf,
            growth: self.growth,
        };
        let tape = Tape::with_empty_document(arena)?;
        debug!(offset = self.offset, "writer began document");
        Ok(WriterDocument {
            tape,
            committed: &mut self.offset,
            done: false,
        })
    }
}

/// A document being written by a [`Writer`]. Dropping it without calling
/// [`WriterDocument::end`] discards it.
pub struct WriterDocument<'w> {
    tape: Tape<VecArena<'w>>,
    committed: &'w mut usize,
    done: bool,
}

impl WriterDocument<'_> {
    /// Appends a key/value pair to the end of the document.
    pub fn append<'a>(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<RawBsonRef<'a>>,
    ) -> Result<()> {
        encode::append_value(&mut self.tape, 0, key.as_ref(), value.into())
    }

    /// Opens an embedded document under `key`.
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

    /// The document as written so far.
    pub fn as_document(&self) -> &RawDocument {
        RawDocument::new_unchecked(self.tape.as_bytes())
    }

    /// Commits the document. Returns its length.
    pub fn end(mut self) -> usize {
        let len = self.tape.as_bytes().len();
        *self.committed = self.tape.root() + len;
        self.done = true;
        debug!(len, "writer committed document");
        len
    }

    /// Discards the document, leaving the buffer as it was before [`Writer::begin`].
    pub fn rollback(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.done {
            return;
        }
        let root = self.tape.root();
        self.tape.arena_mut().truncate(root);
        self.done = true;
        debug!(offset = root, "writer rolled back document");
    }
}

impl Drop for WriterDocument<'_> {
    fn drop(&mut self) {
        self.discard();
    }
}

impl std::fmt::Debug for WriterDocument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterDocument")
            .field("data", &hex::encode(self.tape.as_bytes()))
            .finish()
    }
}

impl std::fmt::Debug for Writer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("growth", &self.growth)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::Writer;
    use crate::{error::ErrorKind, reader::SliceReader};

    #[test]
    fn documents_are_written_back_to_back() {
        let mut buf = b"prefix".to_vec();
        let mut writer = Writer::new(&mut buf);
        for i in 0..3 {
            let mut doc = writer.begin().unwrap();
            doc.append("i", i).unwrap();
            let mut child = doc.append_document_begin("child").unwrap();
            child.append("s", "x").unwrap();
            child.end();
            assert_eq!(doc.as_document().get_i32("i").unwrap(), i);
            doc.end();
        }
        let written = writer.len();
        assert_eq!(buf.len(), 6 + written);

        let mut reader = SliceReader::new(&buf[6..]);
        for i in 0..3 {
            let doc = reader.read_next().unwrap().unwrap();
            assert_eq!(doc.get_i32("i").unwrap(), i);
            assert_eq!(doc.get_document("child").unwrap().get_str("s").unwrap(), "x");
        }
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn dropping_an_open_document_rolls_back() {
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        {
            let mut doc = writer.begin().unwrap();
            doc.append("a", true).unwrap();
        }
        assert_eq!(writer.len(), 0);
        drop(writer);
        assert!(buf.is_empty());
    }

    #[test]
    fn fixed_writer_refuses_to_grow() {
        let mut buf = Vec::with_capacity(16);
        let capacity = buf.capacity();
        let mut writer = Writer::fixed(&mut buf);

        let mut doc = writer.begin().unwrap();
        doc.append("a", 1).unwrap();
        let err = doc.append("long key that does not fit", 1).unwrap_err();
        assert_matches!(err.kind, ErrorKind::InsufficientCapacity { .. });
        assert_eq!(doc.as_document().as_bytes().len(), 12);
        doc.end();

        assert_eq!(writer.len(), 12);
        assert_eq!(buf.capacity(), capacity);
    }
}
