//! Builds documents from tokenizer events.
//!
//! Plain objects and arrays are encoded as they arrive. An object whose first key is one of the
//! extended JSON markers (`$oid`, `$date`, `$binary`, ...) is instead collected whole and
//! appended as a single typed value when it closes. A `$scope` inside such a wrapper is an
//! ordinary document, so it is built in a target of its own while the wrapper waits.

use crate::{
    base64,
    bson::{DbPointer, Regex, Timestamp},
    error::{Error, ErrorKind, JsonErrorKind, Result},
    extjson::tokenizer::{is_json_whitespace, Event, Feed, Sink, Tokenizer},
    oid::ObjectId,
    raw::{encode, RawBson, RawBsonRef, RawDocumentBuf, RawJavaScriptCodeWithScope, MAX_DEPTH},
    spec::{BinarySubtype, ElementType},
    Binary,
    DateTime,
};

/// Keys that open an extended JSON wrapper when they come first in an object.
const MARKERS: &[&str] = &[
    "$oid",
    "$binary",
    "$type",
    "$date",
    "$timestamp",
    "$regex",
    "$options",
    "$undefined",
    "$minKey",
    "$maxKey",
    "$numberLong",
    "$numberInt",
    "$numberDouble",
    "$code",
    "$scope",
    "$symbol",
    "$dbPointer",
];

/// Maps nest at most this deep inside a wrapper: `$dbPointer`, then `$id`, then `$oid`.
const MAX_WRAPPER_DEPTH: usize = 3;

/// A value collected inside a wrapper object.
#[derive(Debug)]
enum ExtValue {
    String(String),
    Number(String),
    Bool(bool),
    Null,
    Map(Vec<(String, ExtValue)>),
    Document(RawDocumentBuf),
}

impl ExtValue {
    fn describe(&self) -> &'static str {
        match self {
            ExtValue::String(_) => "a string",
            ExtValue::Number(_) => "a number",
            ExtValue::Bool(_) => "a boolean",
            ExtValue::Null => "null",
            ExtValue::Map(_) => "an object",
            ExtValue::Document(_) => "a document",
        }
    }
}

#[derive(Debug)]
struct Wrapper {
    marker: &'static str,
    /// The wrapper's key in the enclosing document.
    key: String,
    /// Open maps, outermost first. `maps[0]` is the wrapper itself.
    maps: Vec<Vec<(String, ExtValue)>>,
    /// The key each of `maps[1..]` will be stored under.
    keys: Vec<String>,
    pending: Option<String>,
}

impl Wrapper {
    fn new(marker: &'static str, key: String) -> Self {
        Self {
            marker,
            key,
            maps: vec![Vec::new()],
            keys: Vec::new(),
            pending: Some(marker.to_string()),
        }
    }

    fn insert(&mut self, value: ExtValue) {
        let key = self.pending.take().unwrap_or_default();
        if let Some(map) = self.maps.last_mut() {
            map.push((key, value));
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Document,
    Array { next: usize },
}

/// A document under construction together with its open containers.
struct Target {
    doc: RawDocumentBuf,
    frames: Vec<Frame>,
    key: Option<String>,
    /// Nesting level of `doc` itself in the final document. Non-zero for `$scope` documents.
    outer_depth: usize,
}

impl Target {
    fn new(outer_depth: usize) -> Self {
        Self {
            doc: RawDocumentBuf::new(),
            frames: vec![Frame::Document],
            key: None,
            outer_depth,
        }
    }

    /// Opens a child container under `key`, counting the levels above `doc` towards the limit.
    fn begin_child(&mut self, element_type: ElementType, key: &str) -> Result<()> {
        let depth = self.depth();
        if self.outer_depth + depth + 1 > MAX_DEPTH {
            return Err(Error::depth_exceeded());
        }
        self.doc.encoder().begin_child(depth, element_type, key)
    }

    /// The encoder depth of the innermost open container.
    fn depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    /// The key for the next value: the pending object key, or the next array index.
    fn next_key(&mut self) -> String {
        match self.frames.last_mut() {
            Some(Frame::Array { next }) => {
                let key = next.to_string();
                *next += 1;
                key
            }
            _ => self.key.take().unwrap_or_default(),
        }
    }

    fn append(&mut self, value: RawBsonRef<'_>) -> Result<()> {
        let key = self.next_key();
        let depth = self.depth();
        encode::append_value(self.doc.encoder(), depth, &key, value)
    }
}

enum Mode {
    /// Waiting for the `{` of a top-level document.
    Start,
    Normal,
    /// After `{` in value position: a wrapper or a plain embedded document.
    PendingMap { key: String },
    Wrapper(Box<Wrapper>),
}

pub(crate) struct Parser {
    mode: Mode,
    targets: Vec<Target>,
    /// Wrappers waiting for their `$scope` document to close.
    parked: Vec<Box<Wrapper>>,
    completed: Option<RawDocumentBuf>,
    offset: usize,
}

impl Parser {
    pub(crate) fn new() -> Self {
        Self {
            mode: Mode::Start,
            targets: Vec::new(),
            parked: Vec::new(),
            completed: None,
            offset: 0,
        }
    }

    /// The most recently completed top-level document.
    pub(crate) fn take_document(&mut self) -> Option<RawDocumentBuf> {
        self.completed.take()
    }

    fn unexpected(&self, event: Event<'_>, context: &'static str) -> Error {
        Error::json(
            JsonErrorKind::UnexpectedToken {
                found: event.describe(),
                context,
            },
            self.offset,
        )
    }

    fn start(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::StartMap => {
                self.targets.push(Target::new(0));
                self.mode = Mode::Normal;
                Ok(())
            }
            other => Err(self.unexpected(other, "at top level, expected an object")),
        }
    }

    fn normal(&mut self, event: Event<'_>) -> Result<()> {
        self.mode = Mode::Normal;
        let Some(target) = self.targets.last_mut() else {
            return Err(Error::json(
                JsonErrorKind::Syntax {
                    message: "value outside of a document".to_string(),
                },
                self.offset,
            ));
        };
        match event {
            Event::Key(key) => {
                target.key = Some(key.to_string());
                Ok(())
            }
            Event::StartMap => {
                let key = target.next_key();
                self.mode = Mode::PendingMap { key };
                Ok(())
            }
            Event::StartArray => {
                let key = target.next_key();
                target.begin_child(ElementType::Array, &key)?;
                target.frames.push(Frame::Array { next: 0 });
                Ok(())
            }
            Event::EndMap | Event::EndArray => self.close(),
            Event::String(s) => target.append(RawBsonRef::String(s)),
            Event::Number(text) => target.append(number_value(text)?),
            Event::Bool(b) => target.append(RawBsonRef::Boolean(b)),
            Event::Null => target.append(RawBsonRef::Null),
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(target) = self.targets.last_mut() else {
            return Ok(());
        };
        let depth = target.depth();
        target.frames.pop();
        if depth > 0 {
            return target.doc.encoder().end_child(depth);
        }

        let Some(done) = self.targets.pop() else {
            return Ok(());
        };
        match self.parked.pop() {
            Some(mut wrapper) => {
                wrapper.insert(ExtValue::Document(done.doc));
                self.mode = Mode::Wrapper(wrapper);
            }
            None => {
                self.completed = Some(done.doc);
                self.mode = Mode::Start;
            }
        }
        Ok(())
    }

    fn pending_map(&mut self, key: String, event: Event<'_>) -> Result<()> {
        if let Event::Key(first) = event {
            if let Some(marker) = MARKERS.iter().find(|m| **m == first) {
                self.mode = Mode::Wrapper(Box::new(Wrapper::new(*marker, key)));
                return Ok(());
            }
        }

        self.mode = Mode::Normal;
        let Some(target) = self.targets.last_mut() else {
            return Ok(());
        };
        let depth = target.depth();
        match event {
            Event::Key(first) => {
                target.begin_child(ElementType::EmbeddedDocument, &key)?;
                target.frames.push(Frame::Document);
                target.key = Some(first.to_string());
                Ok(())
            }
            Event::EndMap => {
                target.begin_child(ElementType::EmbeddedDocument, &key)?;
                target.doc.encoder().end_child(depth + 1)
            }
            other => Err(self.unexpected(other, "at start of object")),
        }
    }

    fn wrapper(&mut self, mut wrapper: Box<Wrapper>, event: Event<'_>) -> Result<()> {
        match event {
            Event::Key(key) => wrapper.pending = Some(key.to_string()),
            Event::String(s) => wrapper.insert(ExtValue::String(s.to_string())),
            Event::Number(n) => wrapper.insert(ExtValue::Number(n.to_string())),
            Event::Bool(b) => wrapper.insert(ExtValue::Bool(b)),
            Event::Null => wrapper.insert(ExtValue::Null),
            Event::StartMap
                if wrapper.maps.len() == 1 && wrapper.pending.as_deref() == Some("$scope") =>
            {
                // The scope sits one level below the frame that holds the wrapper.
                let outer_depth = self
                    .targets
                    .last()
                    .map_or(0, |t| t.outer_depth + t.depth() + 1);
                if outer_depth > MAX_DEPTH {
                    return Err(Error::depth_exceeded());
                }
                self.parked.push(wrapper);
                self.targets.push(Target::new(outer_depth));
                self.mode = Mode::Normal;
                return Ok(());
            }
            Event::StartMap => {
                if wrapper.maps.len() >= MAX_WRAPPER_DEPTH {
                    return Err(invalid(wrapper.marker, "objects are nested too deeply"));
                }
                let key = wrapper.pending.take().unwrap_or_default();
                wrapper.keys.push(key);
                wrapper.maps.push(Vec::new());
            }
            Event::EndMap => {
                let fields = wrapper.maps.pop().unwrap_or_default();
                match wrapper.keys.pop() {
                    Some(key) => {
                        if let Some(parent) = wrapper.maps.last_mut() {
                            parent.push((key, ExtValue::Map(fields)));
                        }
                    }
                    None => {
                        self.mode = Mode::Normal;
                        let Some(target) = self.targets.last_mut() else {
                            return Ok(());
                        };
                        let depth = target.depth();
                        let value = wrapper_value(Fields {
                            marker: wrapper.marker,
                            fields,
                        })?;
                        return encode::append_value(
                            target.doc.encoder(),
                            depth,
                            &wrapper.key,
                            value.as_raw_bson_ref(),
                        );
                    }
                }
            }
            Event::StartArray | Event::EndArray => {
                return Err(invalid(wrapper.marker, "arrays are not allowed"));
            }
        }
        self.mode = Mode::Wrapper(wrapper);
        Ok(())
    }
}

impl Sink for Parser {
    fn event(&mut self, event: Event<'_>, offset: usize) -> Result<()> {
        self.offset = offset;
        let result = match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Start => {
                self.mode = Mode::Start;
                self.start(event)
            }
            Mode::Normal => self.normal(event),
            Mode::PendingMap { key } => self.pending_map(key, event),
            Mode::Wrapper(wrapper) => self.wrapper(wrapper, event),
        };
        result.map_err(|e| match e.offset {
            Some(_) => e,
            None => e.with_offset(offset),
        })
    }
}

fn invalid(marker: &'static str, message: impl Into<String>) -> Error {
    Error::from(ErrorKind::Json {
        kind: JsonErrorKind::InvalidValue {
            marker,
            message: message.into(),
        },
    })
}

fn number_value(text: &str) -> Result<RawBsonRef<'static>> {
    if text.contains(['.', 'e', 'E']) {
        return text.parse::<f64>().map(RawBsonRef::Double).map_err(|e| {
            Error::from(ErrorKind::Json {
                kind: JsonErrorKind::Syntax {
                    message: e.to_string(),
                },
            })
        });
    }
    match text.parse::<i64>() {
        Ok(i) => Ok(i32::try_from(i)
            .map(RawBsonRef::Int32)
            .unwrap_or(RawBsonRef::Int64(i))),
        Err(_) => Err(Error::from(ErrorKind::Json {
            kind: JsonErrorKind::NumberOutOfRange {
                text: text.to_string(),
            },
        })),
    }
}

/// The collected fields of one wrapper object (or of a map nested in one).
struct Fields {
    marker: &'static str,
    fields: Vec<(String, ExtValue)>,
}

impl Fields {
    fn take(&mut self, name: &str) -> Option<ExtValue> {
        let index = self.fields.iter().position(|(k, _)| k == name)?;
        Some(self.fields.remove(index).1)
    }

    fn require(&mut self, name: &'static str) -> Result<ExtValue> {
        self.take(name).ok_or_else(|| {
            Error::from(ErrorKind::Json {
                kind: JsonErrorKind::MissingKey {
                    marker: self.marker,
                    missing: name,
                },
            })
        })
    }

    fn invalid(&self, message: impl Into<String>) -> Error {
        invalid(self.marker, message)
    }

    fn take_str(&mut self, name: &'static str) -> Result<String> {
        match self.require(name)? {
            ExtValue::String(s) => Ok(s),
            other => Err(self.invalid(format!("{name} must be a string, not {}", other.describe()))),
        }
    }

    fn take_map(&mut self, name: &'static str) -> Result<Fields> {
        match self.require(name)? {
            ExtValue::Map(fields) => Ok(Fields {
                marker: self.marker,
                fields,
            }),
            other => Err(self.invalid(format!(
                "{name} must be an object, not {}",
                other.describe()
            ))),
        }
    }

    fn take_u32(&mut self, name: &'static str) -> Result<u32> {
        match self.require(name)? {
            ExtValue::Number(text) => text
                .parse()
                .map_err(|_| self.invalid(format!("{name} must be an unsigned 32-bit integer"))),
            other => Err(self.invalid(format!("{name} must be a number, not {}", other.describe()))),
        }
    }

    /// Rejects any key that was not consumed.
    fn finish(&self) -> Result<()> {
        match self.fields.first() {
            Some((key, _)) => Err(self.invalid(format!("unexpected key {key:?}"))),
            None => Ok(()),
        }
    }
}

fn parse_i64(fields: &Fields, text: &str) -> Result<i64> {
    text.parse()
        .map_err(|_| fields.invalid(format!("{text:?} is not a 64-bit integer")))
}

fn parse_subtype(fields: &Fields, text: &str) -> Result<BinarySubtype> {
    if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(fields.invalid(format!("{text:?} is not a hex subtype")));
    }
    u8::from_str_radix(text, 16)
        .map(BinarySubtype::from)
        .map_err(|e| fields.invalid(e.to_string()))
}

fn decode_base64(fields: &Fields, text: &str) -> Result<Vec<u8>> {
    base64::decode(text).map_err(|e| fields.invalid(e.to_string()))
}

/// Interprets a closed wrapper as the value it describes.
fn wrapper_value(mut fields: Fields) -> Result<RawBson> {
    let value = match fields.marker {
        "$oid" => {
            let hex = fields.take_str("$oid")?;
            RawBson::ObjectId(ObjectId::parse_str(&hex).map_err(|e| fields.invalid(e.to_string()))?)
        }
        "$binary" | "$type" => {
            let (bytes, subtype) = match fields.require("$binary")? {
                ExtValue::String(b64) => {
                    let subtype = fields.take_str("$type")?;
                    (
                        decode_base64(&fields, &b64)?,
                        parse_subtype(&fields, &subtype)?,
                    )
                }
                ExtValue::Map(inner) => {
                    let mut inner = Fields {
                        marker: "$binary",
                        fields: inner,
                    };
                    let b64 = inner.take_str("base64")?;
                    let subtype = inner.take_str("subType")?;
                    inner.finish()?;
                    (
                        decode_base64(&inner, &b64)?,
                        parse_subtype(&inner, &subtype)?,
                    )
                }
                other => {
                    return Err(fields.invalid(format!(
                        "$binary must be a string or an object, not {}",
                        other.describe()
                    )));
                }
            };
            RawBson::Binary(Binary { subtype, bytes })
        }
        "$date" => {
            let millis = match fields.require("$date")? {
                ExtValue::Number(text) if text.contains(['.', 'e', 'E']) => text
                    .parse::<f64>()
                    .map(|f| f.floor() as i64)
                    .map_err(|e| fields.invalid(e.to_string()))?,
                ExtValue::Number(text) => parse_i64(&fields, &text)?,
                ExtValue::String(text) => DateTime::parse_iso8601_str(&text)
                    .map_err(|e| fields.invalid(e.to_string()))?
                    .timestamp_millis(),
                ExtValue::Map(inner) => {
                    let mut inner = Fields {
                        marker: "$date",
                        fields: inner,
                    };
                    let text = inner.take_str("$numberLong")?;
                    inner.finish()?;
                    parse_i64(&inner, &text)?
                }
                other => {
                    return Err(fields.invalid(format!(
                        "$date must be a number, string or object, not {}",
                        other.describe()
                    )));
                }
            };
            RawBson::DateTime(DateTime::from_millis(millis))
        }
        "$timestamp" => {
            let mut inner = fields.take_map("$timestamp")?;
            let time = inner.take_u32("t")?;
            let increment = inner.take_u32("i")?;
            inner.finish()?;
            RawBson::Timestamp(Timestamp { time, increment })
        }
        // Options are kept in the order written.
        "$regex" | "$options" => RawBson::RegularExpression(Regex {
            pattern: fields.take_str("$regex")?,
            options: fields.take_str("$options")?,
        }),
        "$undefined" => match fields.require("$undefined")? {
            ExtValue::Bool(true) => RawBson::Undefined,
            _ => return Err(fields.invalid("$undefined must be true")),
        },
        "$minKey" | "$maxKey" => {
            let marker = fields.marker;
            match fields.require(marker)? {
                ExtValue::Number(n) if n == "1" && marker == "$minKey" => RawBson::MinKey,
                ExtValue::Number(n) if n == "1" => RawBson::MaxKey,
                _ => return Err(fields.invalid(format!("{marker} must be 1"))),
            }
        }
        "$numberLong" => {
            let text = fields.take_str("$numberLong")?;
            RawBson::Int64(parse_i64(&fields, &text)?)
        }
        "$numberInt" => {
            let text = fields.take_str("$numberInt")?;
            let value = text
                .parse::<i32>()
                .map_err(|_| fields.invalid(format!("{text:?} is not a 32-bit integer")))?;
            RawBson::Int32(value)
        }
        "$numberDouble" => {
            let text = fields.take_str("$numberDouble")?;
            let value = match text.as_str() {
                "NaN" => f64::NAN,
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                other => other
                    .parse::<f64>()
                    .map_err(|_| fields.invalid(format!("{other:?} is not a double")))?,
            };
            RawBson::Double(value)
        }
        "$code" | "$scope" => {
            let code = fields.take_str("$code")?;
            match fields.take("$scope") {
                None => RawBson::JavaScriptCode(code),
                Some(ExtValue::Document(scope)) => {
                    RawBson::JavaScriptCodeWithScope(RawJavaScriptCodeWithScope { code, scope })
                }
                Some(other) => {
                    return Err(fields.invalid(format!(
                        "$scope must be an object, not {}",
                        other.describe()
                    )));
                }
            }
        }
        "$symbol" => RawBson::Symbol(fields.take_str("$symbol")?),
        "$dbPointer" => {
            let mut inner = fields.take_map("$dbPointer")?;
            let namespace = inner.take_str("$ref")?;
            let mut id = inner.take_map("$id")?;
            let hex = id.take_str("$oid")?;
            id.finish()?;
            inner.finish()?;
            let id = ObjectId::parse_str(&hex).map_err(|e| fields.invalid(e.to_string()))?;
            RawBson::DbPointer(DbPointer::new(namespace, id))
        }
        other => return Err(invalid(other, "unsupported extended JSON type")),
    };
    fields.finish()?;
    Ok(value)
}

impl RawDocumentBuf {
    /// Parses one JSON object, with MongoDB extended JSON wrappers, into a document. Only
    /// whitespace may follow the object.
    ///
    /// ```
    /// use bson_core::{raw::RawDocumentBuf, spec::BinarySubtype};
    ///
    /// let doc = RawDocumentBuf::from_json(
    ///     r#"{ "n": 1, "big": 5000000000, "bin": { "$binary": "AAEC", "$type": "00" } }"#,
    /// )?;
    /// assert_eq!(doc.get_i32("n")?, 1);
    /// assert_eq!(doc.get_i64("big")?, 5_000_000_000);
    ///
    /// let bin = doc.get_binary("bin")?;
    /// assert_eq!(bin.subtype, BinarySubtype::Generic);
    /// assert_eq!(bin.bytes, &[0, 1, 2]);
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn from_json(json: impl AsRef<str>) -> Result<RawDocumentBuf> {
        let bytes = json.as_ref().as_bytes();
        let mut tokenizer = Tokenizer::new();
        let mut parser = Parser::new();

        match tokenizer.feed(bytes, &mut parser)? {
            Feed::Complete { consumed } => {
                if let Some(pos) = bytes[consumed..]
                    .iter()
                    .position(|b| !is_json_whitespace(*b))
                {
                    return Err(Error::json(
                        JsonErrorKind::TrailingContent,
                        consumed + pos,
                    ));
                }
            }
            Feed::NeedMore => {
                tokenizer.finish(&mut parser)?;
            }
        }
        parser
            .take_document()
            .ok_or_else(|| Error::json(JsonErrorKind::UnexpectedEof, bytes.len()))
    }
}
