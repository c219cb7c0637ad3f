//! Reading a sequence of concatenated documents from a byte stream or an in-memory slice.

use std::{
    fs::File,
    io::{ErrorKind as IoErrorKind, Read},
    path::Path,
};

use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    raw::{i32_from_slice, RawDocument, MIN_BSON_DOCUMENT_SIZE},
};

/// Options for a [`Reader`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ReaderOptions {
    /// The size the internal buffer starts at. It doubles whenever it fills before a document
    /// is complete, up to the next power of two above the document's length.
    pub initial_capacity: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
        }
    }
}

impl ReaderOptions {
    /// Sets [`ReaderOptions::initial_capacity`].
    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }
}

/// Reads the length prefix of the document starting at `data`, checking it is plausible.
fn document_len(data: &[u8], offset: u64) -> Result<usize> {
    let len = i32_from_slice(data)?;
    if len < MIN_BSON_DOCUMENT_SIZE {
        debug!(offset, len, "corrupt document length in stream");
        return Err(Error::malformed_value(format!(
            "document length {len} is less than the minimum of {MIN_BSON_DOCUMENT_SIZE}"
        )));
    }
    Ok(len as usize)
}

/// Reads documents stored back to back in a stream.
///
/// Each document returned by [`Reader::read_next`] borrows the reader's internal buffer and is
/// valid until the next call.
///
/// ```
/// use bson_core::{raw::RawDocumentBuf, reader::Reader};
///
/// let mut bytes = Vec::new();
/// for i in 0..3 {
///     let mut doc = RawDocumentBuf::new();
///     doc.append("i", i)?;
///     bytes.extend_from_slice(doc.as_bytes());
/// }
///
/// let mut reader = Reader::new(&bytes[..]);
/// let mut seen = Vec::new();
/// while let Some(doc) = reader.read_next()? {
///     seen.push(doc.get_i32("i")?);
/// }
/// assert_eq!(seen, [0, 1, 2]);
/// assert_eq!(reader.tell(), bytes.len() as u64);
/// # Ok::<(), bson_core::error::Error>(())
/// ```
pub struct Reader<R> {
    source: R,
    buf: Vec<u8>,
    /// Start of the next document in `buf`.
    start: usize,
    /// End of the valid data in `buf`.
    end: usize,
    /// Stream offset of `buf[0]`.
    base: u64,
    eof: bool,
}

impl Reader<File> {
    /// Opens the file at `path` for reading.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened BSON file");
        Ok(Self::new(file))
    }
}

impl<R: Read> Reader<R> {
    pub fn new(source: R) -> Self {
        Self::with_options(source, ReaderOptions::default())
    }

    pub fn with_options(source: R, options: ReaderOptions) -> Self {
        Self {
            source,
            buf: vec![0; options.initial_capacity.max(MIN_BSON_DOCUMENT_SIZE as usize)],
            start: 0,
            end: 0,
            base: 0,
            eof: false,
        }
    }

    /// The number of bytes of the stream consumed by the documents read so far.
    pub fn tell(&self) -> u64 {
        self.base + self.start as u64
    }

    /// Whether the source has reported the end of the stream.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Reads the next document. Returns `Ok(None)` when the stream ends cleanly between
    /// documents; a stream ending inside a document is an error.
    pub fn read_next(&mut self) -> Result<Option<&RawDocument>> {
        let offset = self.tell();
        self.fill_to(4)?;
        let available = self.end - self.start;
        if available == 0 {
            return Ok(None);
        }
        if available < 4 {
            return Err(
                Error::malformed_value("stream ends inside a length prefix").with_offset(offset as usize)
            );
        }

        let len = document_len(&self.buf[self.start..self.end], offset)
            .map_err(|e| e.with_offset(offset as usize))?;
        self.fill_to(len)?;
        if self.end - self.start < len {
            return Err(Error::malformed_value(format!(
                "stream ends after {} of {len} document bytes",
                self.end - self.start
            ))
            .with_offset(offset as usize));
        }

        let range = self.start..self.start + len;
        self.start += len;
        RawDocument::from_bytes(&self.buf[range])
            .map(Some)
            .map_err(|e| e.with_offset(offset as usize))
    }

    /// Reads from the source until at least `n` unread bytes are buffered or the stream ends.
    fn fill_to(&mut self, n: usize) -> Result<()> {
        if self.end - self.start >= n {
            return Ok(());
        }

        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.base += self.start as u64;
            self.end -= self.start;
            self.start = 0;
        }
        while self.end < n && !self.eof {
            // Grow only as data arrives, so a bogus length prefix cannot force a huge buffer.
            if self.end == self.buf.len() {
                let capacity = (self.buf.len() * 2).min(n.next_power_of_two());
                trace!(from = self.buf.len(), to = capacity, "growing reader buffer");
                self.buf.resize(capacity, 0);
            }
            match self.source.read(&mut self.buf[self.end..]) {
                Ok(0) => self.eof = true,
                Ok(read) => self.end += read,
                Err(e) if matches!(e.kind(), IoErrorKind::Interrupted | IoErrorKind::WouldBlock) => {
                    trace!(kind = ?e.kind(), "retrying read");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Reads documents stored back to back in a slice, without copying.
#[derive(Clone, Debug)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Reads the next document. Returns `Ok(None)` at the end of the slice.
    pub fn read_next(&mut self) -> Result<Option<&'a RawDocument>> {
        let rest = &self.data[self.offset..];
        if rest.is_empty() {
            return Ok(None);
        }
        let len = document_len(rest, self.offset as u64).map_err(|e| e.with_offset(self.offset))?;
        let bytes = rest.get(..len).ok_or_else(|| {
            Error::malformed_value(format!(
                "slice ends after {} of {len} document bytes",
                rest.len()
            ))
            .with_offset(self.offset)
        })?;
        let doc = RawDocument::from_bytes(bytes).map_err(|e| e.with_offset(self.offset))?;
        self.offset += len;
        Ok(Some(doc))
    }

    /// Starts reading from the beginning of the slice again.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// The number of bytes consumed by the documents read so far.
    pub fn tell(&self) -> usize {
        self.offset
    }
}
