//! A resumable, byte-oriented JSON tokenizer.
//!
//! Input may arrive in chunks of any size, split anywhere (inside strings, escapes, numbers or
//! multi-byte characters). Each complete token is handed to a [`Sink`] together with the byte
//! offset at which it started, counted from the first byte ever fed to the tokenizer.

use crate::error::{Error, JsonErrorKind, Result};

/// The deepest nesting of objects and arrays the tokenizer accepts.
pub(crate) const MAX_NESTING: usize = 128;

/// A token delivered to a [`Sink`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Event<'t> {
    StartMap,
    EndMap,
    StartArray,
    EndArray,
    Key(&'t str),
    String(&'t str),
    /// The number's text, checked against the JSON number grammar.
    Number(&'t str),
    Bool(bool),
    Null,
}

impl Event<'_> {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Event::StartMap => "object",
            Event::EndMap => "end of object",
            Event::StartArray => "array",
            Event::EndArray => "end of array",
            Event::Key(_) => "key",
            Event::String(_) => "string",
            Event::Number(_) => "number",
            Event::Bool(_) => "boolean",
            Event::Null => "null",
        }
    }
}

/// Receives tokens as they are completed.
pub(crate) trait Sink {
    fn event(&mut self, event: Event<'_>, offset: usize) -> Result<()>;
}

/// What a call to [`Tokenizer::feed`] achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Feed {
    /// All input was consumed and the current top-level value is still open.
    NeedMore,
    /// A top-level value ended after `consumed` bytes of this input. The tokenizer is ready for
    /// another value.
    Complete { consumed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Expecting a top-level value.
    Start,
    /// After `{`: a key or `}`.
    FirstKeyOrEnd,
    /// After `,` in an object.
    BeforeKey,
    /// After a key: `:`.
    AfterKey,
    /// After `:`.
    BeforeValue,
    /// After `[`: a value or `]`.
    FirstValueOrEnd,
    /// After `,` in an array.
    BeforeArrayValue,
    /// After a value inside a container: `,` or the closing bracket.
    AfterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Default,
    String,
    StringEscape,
    StringEscapeUnicode,
    Number,
    Literal,
}

pub(crate) struct Tokenizer {
    parse_state: ParseState,
    lex_state: LexState,
    stack: Vec<Container>,
    buffer: Vec<u8>,
    /// Whether the string being lexed is an object key.
    lexing_key: bool,
    literal: &'static [u8],
    literal_pos: usize,
    unicode: u32,
    unicode_digits: u8,
    high_surrogate: Option<u32>,
    /// Global offset of the next byte.
    offset: usize,
    token_start: usize,
}

impl Tokenizer {
    pub(crate) fn new() -> Self {
        Self {
            parse_state: ParseState::Start,
            lex_state: LexState::Default,
            stack: Vec::new(),
            buffer: Vec::new(),
            lexing_key: false,
            literal: b"",
            literal_pos: 0,
            unicode: 0,
            unicode_digits: 0,
            high_surrogate: None,
            offset: 0,
            token_start: 0,
        }
    }

    /// The global offset of the next byte to be fed.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Whether no part of a value has been seen since the last completed one.
    pub(crate) fn is_idle(&self) -> bool {
        self.parse_state == ParseState::Start && self.lex_state == LexState::Default
    }

    fn syntax(&self, message: impl Into<String>) -> Error {
        Error::json(
            JsonErrorKind::Syntax {
                message: message.into(),
            },
            self.offset,
        )
    }

    fn expects_value(&self) -> bool {
        matches!(
            self.parse_state,
            ParseState::Start
                | ParseState::BeforeValue
                | ParseState::FirstValueOrEnd
                | ParseState::BeforeArrayValue
        )
    }

    fn expects_key(&self) -> bool {
        matches!(
            self.parse_state,
            ParseState::FirstKeyOrEnd | ParseState::BeforeKey
        )
    }

    /// Moves past a completed value. Returns whether it was the top-level value.
    fn after_value(&mut self) -> bool {
        if self.stack.is_empty() {
            self.parse_state = ParseState::Start;
            true
        } else {
            self.parse_state = ParseState::AfterValue;
            false
        }
    }

    /// Feeds the next chunk of input.
    pub(crate) fn feed(&mut self, input: &[u8], sink: &mut dyn Sink) -> Result<Feed> {
        let mut i = 0;
        while i < input.len() {
            let byte = input[i];
            let (consumed, complete) = self.step(byte, sink)?;
            if consumed {
                i += 1;
                self.offset += 1;
            }
            if complete {
                return Ok(Feed::Complete { consumed: i });
            }
        }
        Ok(Feed::NeedMore)
    }

    /// Signals the end of input. A number still being lexed is completed; any other unfinished
    /// value is an error. Returns whether a top-level value was completed by this call.
    pub(crate) fn finish(&mut self, sink: &mut dyn Sink) -> Result<bool> {
        if self.lex_state == LexState::Number && self.stack.is_empty() {
            return self.end_number(sink);
        }
        if self.is_idle() {
            return Ok(false);
        }
        Err(Error::json(JsonErrorKind::UnexpectedEof, self.offset))
    }

    /// Processes one byte. Returns whether the byte was consumed and whether a top-level value
    /// was completed.
    fn step(&mut self, byte: u8, sink: &mut dyn Sink) -> Result<(bool, bool)> {
        match self.lex_state {
            LexState::Default => self.step_default(byte, sink).map(|done| (true, done)),
            LexState::String => self.step_string(byte, sink).map(|done| (true, done)),
            LexState::StringEscape => {
                self.step_escape(byte)?;
                Ok((true, false))
            }
            LexState::StringEscapeUnicode => {
                self.step_unicode(byte)?;
                Ok((true, false))
            }
            LexState::Number => {
                if matches!(byte, b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E') {
                    self.buffer.push(byte);
                    return Ok((true, false));
                }
                // The delimiter is processed again in the default state.
                let done = self.end_number(sink)?;
                Ok((false, done))
            }
            LexState::Literal => self.step_literal(byte, sink).map(|done| (true, done)),
        }
    }

    fn step_default(&mut self, byte: u8, sink: &mut dyn Sink) -> Result<bool> {
        let start = self.offset;
        match byte {
            _ if is_json_whitespace(byte) => Ok(false),
            b'{' | b'[' if self.expects_value() => {
                if self.stack.len() >= MAX_NESTING {
                    return Err(self.syntax(format!("nesting deeper than {MAX_NESTING}")));
                }
                if byte == b'{' {
                    self.stack.push(Container::Object);
                    self.parse_state = ParseState::FirstKeyOrEnd;
                    sink.event(Event::StartMap, start)?;
                } else {
                    self.stack.push(Container::Array);
                    self.parse_state = ParseState::FirstValueOrEnd;
                    sink.event(Event::StartArray, start)?;
                }
                Ok(false)
            }
            b'}' if matches!(
                self.parse_state,
                ParseState::FirstKeyOrEnd | ParseState::AfterValue
            ) && self.stack.last() == Some(&Container::Object) =>
            {
                self.stack.pop();
                sink.event(Event::EndMap, start)?;
                Ok(self.after_value())
            }
            b']' if matches!(
                self.parse_state,
                ParseState::FirstValueOrEnd | ParseState::AfterValue
            ) && self.stack.last() == Some(&Container::Array) =>
            {
                self.stack.pop();
                sink.event(Event::EndArray, start)?;
                Ok(self.after_value())
            }
            b':' if self.parse_state == ParseState::AfterKey => {
                self.parse_state = ParseState::BeforeValue;
                Ok(false)
            }
            b',' if self.parse_state == ParseState::AfterValue => {
                self.parse_state = match self.stack.last() {
                    Some(Container::Object) => ParseState::BeforeKey,
                    _ => ParseState::BeforeArrayValue,
                };
                Ok(false)
            }
            b'"' if self.expects_key() || self.expects_value() => {
                self.lexing_key = self.expects_key();
                self.buffer.clear();
                self.token_start = start;
                self.lex_state = LexState::String;
                Ok(false)
            }
            b'-' | b'0'..=b'9' if self.expects_value() => {
                self.buffer.clear();
                self.buffer.push(byte);
                self.token_start = start;
                self.lex_state = LexState::Number;
                Ok(false)
            }
            b't' | b'f' | b'n' if self.expects_value() => {
                self.literal = match byte {
                    b't' => b"true",
                    b'f' => b"false",
                    _ => b"null",
                };
                self.literal_pos = 1;
                self.token_start = start;
                self.lex_state = LexState::Literal;
                Ok(false)
            }
            _ => Err(self.syntax(format!("unexpected character {:?}", byte as char))),
        }
    }

    fn step_string(&mut self, byte: u8, sink: &mut dyn Sink) -> Result<bool> {
        if self.high_surrogate.is_some() && byte != b'\\' {
            return Err(self.syntax("unpaired surrogate in \\u escape"));
        }
        match byte {
            b'"' => {
                self.lex_state = LexState::Default;
                let text = simdutf8::basic::from_utf8(&self.buffer)
                    .map_err(|_| self.syntax("string is not valid UTF-8"))?;
                if self.lexing_key {
                    sink.event(Event::Key(text), self.token_start)?;
                    self.parse_state = ParseState::AfterKey;
                    Ok(false)
                } else {
                    sink.event(Event::String(text), self.token_start)?;
                    Ok(self.after_value())
                }
            }
            b'\\' => {
                self.lex_state = LexState::StringEscape;
                Ok(false)
            }
            0x00..=0x1F => Err(self.syntax("unescaped control character in string")),
            _ => {
                self.buffer.push(byte);
                Ok(false)
            }
        }
    }

    fn step_escape(&mut self, byte: u8) -> Result<()> {
        if self.high_surrogate.is_some() && byte != b'u' {
            return Err(self.syntax("unpaired surrogate in \\u escape"));
        }
        let unescaped = match byte {
            b'"' => b'"',
            b'\\' => b'\\',
            b'/' => b'/',
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => {
                self.unicode = 0;
                self.unicode_digits = 0;
                self.lex_state = LexState::StringEscapeUnicode;
                return Ok(());
            }
            _ => return Err(self.syntax(format!("invalid escape \\{}", byte as char))),
        };
        self.buffer.push(unescaped);
        self.lex_state = LexState::String;
        Ok(())
    }

    fn step_unicode(&mut self, byte: u8) -> Result<()> {
        let digit = (byte as char)
            .to_digit(16)
            .ok_or_else(|| self.syntax("invalid hex digit in \\u escape"))?;
        self.unicode = self.unicode << 4 | digit;
        self.unicode_digits += 1;
        if self.unicode_digits < 4 {
            return Ok(());
        }

        self.lex_state = LexState::String;
        let unit = self.unicode;
        let is_low = (0xDC00..=0xDFFF).contains(&unit);
        let code_point = match self.high_surrogate.take() {
            Some(high) if is_low => 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00),
            None if (0xD800..=0xDBFF).contains(&unit) => {
                self.high_surrogate = Some(unit);
                return Ok(());
            }
            Some(_) => return Err(self.syntax("unpaired surrogate in \\u escape")),
            None if is_low => return Err(self.syntax("unpaired surrogate in \\u escape")),
            None => unit,
        };
        let c = char::from_u32(code_point)
            .ok_or_else(|| self.syntax("invalid code point in \\u escape"))?;
        let mut utf8 = [0; 4];
        self.buffer
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
        Ok(())
    }

    fn step_literal(&mut self, byte: u8, sink: &mut dyn Sink) -> Result<bool> {
        if self.literal.get(self.literal_pos) != Some(&byte) {
            return Err(self.syntax(format!("unexpected character {:?}", byte as char)));
        }
        self.literal_pos += 1;
        if self.literal_pos < self.literal.len() {
            return Ok(false);
        }
        self.lex_state = LexState::Default;
        let event = match self.literal {
            b"true" => Event::Bool(true),
            b"false" => Event::Bool(false),
            _ => Event::Null,
        };
        sink.event(event, self.token_start)?;
        Ok(self.after_value())
    }

    fn end_number(&mut self, sink: &mut dyn Sink) -> Result<bool> {
        self.lex_state = LexState::Default;
        if !is_json_number(&self.buffer) {
            return Err(Error::json(
                JsonErrorKind::Syntax {
                    message: format!(
                        "invalid number {:?}",
                        String::from_utf8_lossy(&self.buffer)
                    ),
                },
                self.token_start,
            ));
        }
        // The grammar check admits only ASCII.
        let text = simdutf8::basic::from_utf8(&self.buffer)
            .map_err(|_| self.syntax("invalid number"))?;
        sink.event(Event::Number(text), self.token_start)?;
        Ok(self.after_value())
    }
}

pub(crate) fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
fn is_json_number(text: &[u8]) -> bool {
    let mut rest = text.strip_prefix(b"-").unwrap_or(text);

    let digits = |s: &[u8]| s.iter().take_while(|b| b.is_ascii_digit()).count();

    match rest.first() {
        Some(b'0') => rest = &rest[1..],
        Some(b'1'..=b'9') => rest = &rest[digits(rest)..],
        _ => return false,
    }
    if let Some(fraction) = rest.strip_prefix(b".") {
        let n = digits(fraction);
        if n == 0 {
            return false;
        }
        rest = &fraction[n..];
    }
    if let Some(exponent) = rest.strip_prefix(b"e").or_else(|| rest.strip_prefix(b"E")) {
        let exponent = exponent
            .strip_prefix(b"+")
            .or_else(|| exponent.strip_prefix(b"-"))
            .unwrap_or(exponent);
        let n = digits(exponent);
        if n == 0 {
            return false;
        }
        rest = &exponent[n..];
    }
    rest.is_empty()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Sink for Recorder {
        fn event(&mut self, event: Event<'_>, offset: usize) -> Result<()> {
            self.0.push(format!("{offset}:{event:?}"));
            Ok(())
        }
    }

    fn tokenize_in_chunks(input: &str, chunk: usize) -> Vec<String> {
        let mut tokenizer = Tokenizer::new();
        let mut recorder = Recorder::default();
        for piece in input.as_bytes().chunks(chunk) {
            tokenizer.feed(piece, &mut recorder).unwrap();
        }
        recorder.0
    }

    #[test]
    fn chunk_boundaries_do_not_change_tokens() {
        let input = r#"{"k\u00e9y": [1, -2.5e3, "x\"y", true, null, {"\ud83d\ude00": false}]}"#;
        let whole = tokenize_in_chunks(input, input.len());
        for chunk in 1..8 {
            assert_eq!(tokenize_in_chunks(input, chunk), whole);
        }
        assert_eq!(whole[1], "1:Key(\"kéy\")");
        assert!(whole.contains(&"25:String(\"x\\\"y\")".to_string()));
    }

    #[test]
    fn reports_completion() {
        let mut tokenizer = Tokenizer::new();
        let mut recorder = Recorder::default();
        let feed = tokenizer.feed(b"{} {}", &mut recorder).unwrap();
        assert_eq!(feed, Feed::Complete { consumed: 2 });
        assert!(tokenizer.is_idle());
    }

    #[test]
    fn number_grammar() {
        for ok in ["0", "-0", "10", "1.5", "1e5", "1E+5", "-1.25e-3"] {
            assert!(is_json_number(ok.as_bytes()), "{ok}");
        }
        for bad in ["01", "-", "1.", ".5", "1e", "1e+", "--1", "1-2"] {
            assert!(!is_json_number(bad.as_bytes()), "{bad}");
        }
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "{,}",
            "{\"a\" 1}",
            "[1,]",
            "{\"a\":1,}",
            "{\"a\":tru}",
            "{\"a\":\"\u{1}\"}",
            "{\"a\":\"\\ud800x\"}",
            "{\"a\":\"\\q\"}",
        ] {
            let mut tokenizer = Tokenizer::new();
            let mut recorder = Recorder::default();
            assert!(tokenizer.feed(bad.as_bytes(), &mut recorder).is_err(), "{bad}");
        }
    }

    #[test]
    fn nesting_limit() {
        let input = "[".repeat(MAX_NESTING + 1);
        let mut tokenizer = Tokenizer::new();
        let mut recorder = Recorder::default();
        let err = tokenizer
            .feed(input.as_bytes(), &mut recorder)
            .unwrap_err();
        assert_eq!(err.offset, Some(MAX_NESTING));
    }
}
