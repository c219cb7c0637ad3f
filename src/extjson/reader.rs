use std::io::{ErrorKind as IoErrorKind, Read};

use tracing::{debug, trace};

use crate::{
    error::{Error, JsonErrorKind, Result},
    extjson::{
        parser::Parser,
        tokenizer::{is_json_whitespace, Feed, Tokenizer},
    },
    raw::RawDocumentBuf,
};

/// Options for a [`JsonReader`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct JsonReaderOptions {
    /// Read a sequence of documents separated by optional whitespace. When unset, anything but
    /// whitespace after the first document is an error.
    pub allow_multiple: bool,

    /// How many bytes to request from the source per read.
    pub chunk_size: usize,
}

impl Default for JsonReaderOptions {
    fn default() -> Self {
        Self {
            allow_multiple: false,
            chunk_size: 16 * 1024,
        }
    }
}

impl JsonReaderOptions {
    /// Sets [`JsonReaderOptions::allow_multiple`].
    pub fn allow_multiple(mut self, allow_multiple: bool) -> Self {
        self.allow_multiple = allow_multiple;
        self
    }

    /// Sets [`JsonReaderOptions::chunk_size`]. A size of zero is treated as one.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Reads extended JSON documents incrementally, either pulling from a [`Read`] source or from
/// chunks pushed with [`JsonReader::ingest`].
///
/// Input is tokenized as it arrives, so a document may be split across reads at any byte. After
/// an error the reader should be discarded.
///
/// ```
/// use bson_core::extjson::{JsonReader, JsonReaderOptions};
///
/// let input = br#"{ "a" : 1 } { "a" : 2 }"#;
/// let options = JsonReaderOptions::default().allow_multiple(true);
/// let mut reader = JsonReader::with_options(&input[..], options);
///
/// assert_eq!(reader.read_document()?.unwrap().get_i32("a")?, 1);
/// assert_eq!(reader.read_document()?.unwrap().get_i32("a")?, 2);
/// assert!(reader.read_document()?.is_none());
/// # Ok::<(), bson_core::error::Error>(())
/// ```
pub struct JsonReader<R> {
    source: Option<R>,
    options: JsonReaderOptions,
    tokenizer: Tokenizer,
    parser: Parser,
    /// Input received but not yet fed to the tokenizer.
    pending: Vec<u8>,
    eof: bool,
    documents: usize,
    /// Whitespace discarded after the only allowed document.
    skipped: usize,
}

impl<R: Read> JsonReader<R> {
    /// Reads from `source` with default options.
    pub fn new(source: R) -> Self {
        Self::with_options(source, JsonReaderOptions::default())
    }

    pub fn with_options(source: R, options: JsonReaderOptions) -> Self {
        Self::build(Some(source), options)
    }
}

impl JsonReader<std::io::Empty> {
    /// Creates a reader that is fed with [`JsonReader::ingest`] instead of pulling from a
    /// source.
    ///
    /// ```
    /// use bson_core::extjson::{JsonReader, JsonReaderOptions};
    ///
    /// let mut reader = JsonReader::from_data(JsonReaderOptions::default());
    /// reader.ingest(br#"{ "x" : "par"#);
    /// assert!(reader.read_document()?.is_none());
    ///
    /// reader.ingest(br#"tial" }"#);
    /// let doc = reader.read_document()?.unwrap();
    /// assert_eq!(doc.get_str("x")?, "partial");
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn from_data(options: JsonReaderOptions) -> Self {
        Self::build(None, options)
    }
}

impl<R: Read> JsonReader<R> {
    fn build(source: Option<R>, options: JsonReaderOptions) -> Self {
        Self {
            source,
            options,
            tokenizer: Tokenizer::new(),
            parser: Parser::new(),
            pending: Vec::new(),
            eof: false,
            documents: 0,
            skipped: 0,
        }
    }

    /// Appends input for the reader to consume.
    pub fn ingest(&mut self, data: &[u8]) {
        trace!("ingesting {} bytes of JSON", data.len());
        self.pending.extend_from_slice(data);
    }

    /// Marks the end of pushed input. A document still incomplete at this point becomes an
    /// error on the next read.
    pub fn close_input(&mut self) {
        self.eof = true;
    }

    /// The number of input bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.tokenizer.offset() + self.skipped
    }

    /// Reads the next document.
    ///
    /// Returns `Ok(None)` at the end of input, and also, for a reader created with
    /// [`JsonReader::from_data`], when the input ingested so far ends inside a document.
    pub fn read_document(&mut self) -> Result<Option<RawDocumentBuf>> {
        if self.documents > 0 && !self.options.allow_multiple {
            return self.expect_only_whitespace();
        }

        loop {
            if !self.pending.is_empty() {
                let mut data = std::mem::take(&mut self.pending);
                match self.tokenizer.feed(&data, &mut self.parser)? {
                    Feed::Complete { consumed } => {
                        data.drain(..consumed);
                        self.pending = data;
                        return Ok(self.completed());
                    }
                    Feed::NeedMore => {}
                }
            }

            if self.eof {
                let completed = self.tokenizer.finish(&mut self.parser)?;
                return Ok(if completed { self.completed() } else { None });
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    fn completed(&mut self) -> Option<RawDocumentBuf> {
        let doc = self.parser.take_document()?;
        self.documents += 1;
        debug!(
            "read JSON document {} ({} bytes)",
            self.documents,
            doc.as_bytes().len()
        );
        Some(doc)
    }

    /// Pulls the next chunk from the source. Returns false when there is no source to pull from.
    fn fill(&mut self) -> Result<bool> {
        let Some(source) = self.source.as_mut() else {
            return Ok(false);
        };
        let mut chunk = vec![0; self.options.chunk_size.max(1)];
        loop {
            match source.read(&mut chunk) {
                Ok(0) => {
                    trace!("JSON source reached end of input");
                    self.eof = true;
                    return Ok(true);
                }
                Ok(n) => {
                    chunk.truncate(n);
                    self.ingest(&chunk);
                    return Ok(true);
                }
                Err(e) if e.kind() == IoErrorKind::Interrupted => {
                    trace!("JSON source read interrupted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// After the only allowed document, accepts nothing but whitespace.
    fn expect_only_whitespace(&mut self) -> Result<Option<RawDocumentBuf>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| !is_json_whitespace(*b)) {
                return Err(Error::json(
                    JsonErrorKind::TrailingContent,
                    self.offset() + pos,
                ));
            }
            self.skipped += self.pending.len();
            self.pending.clear();
            if self.eof || !self.fill()? {
                return Ok(None);
            }
        }
    }
}
