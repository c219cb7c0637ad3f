//! Rendering of documents and values as MongoDB extended JSON (legacy, "relaxed" v1 form).
//!
//! Objects are written as `{ "key" : value, ... }` and arrays as `[ value, ... ]`. Types JSON
//! cannot express render as single-purpose wrapper objects such as `{ "$oid" : "..." }`, which
//! [`RawDocumentBuf::from_json`](crate::raw::RawDocumentBuf::from_json) reads back.

use std::{fmt::Write, ops::ControlFlow};

use crate::{
    base64,
    bson::Timestamp,
    error::{Error, ErrorKind, Result},
    oid::ObjectId,
    raw::{
        visit_all,
        RawArray,
        RawBinaryRef,
        RawBsonRef,
        RawDbPointerRef,
        RawDocument,
        RawElement,
        RawJavaScriptCodeWithScopeRef,
        RawRegexRef,
        Visit,
        Visitor,
        MAX_DEPTH,
    },
    DateTime,
};

/// Appends `value` to `out` as a JSON string literal.
fn write_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// `printf("%.*g")`: `precision` significant digits, trailing zeros removed, exponent form when
/// the exponent is below -4 or at least `precision`.
fn format_general(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Formats a finite double with 15 significant digits, or 17 when 15 do not round-trip. The
/// result always reads back as a double.
pub(crate) fn format_double(value: f64) -> String {
    let mut text = format_general(value, 15);
    if text.parse::<f64>().ok() != Some(value) {
        text = format_general(value, 17);
    }
    if !text.contains(['.', 'e']) {
        text.push_str(".0");
    }
    text
}

fn write_double(out: &mut String, value: f64) {
    if value.is_finite() {
        out.push_str(&format_double(value));
        return;
    }
    let text = if value.is_nan() {
        "NaN"
    } else if value > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    };
    let _ = write!(out, "{{ \"$numberDouble\" : \"{text}\" }}");
}

fn write_binary(out: &mut String, value: RawBinaryRef<'_>) {
    out.push_str("{ \"$binary\" : \"");
    base64::encode_into(value.bytes, out);
    let _ = write!(
        out,
        "\", \"$type\" : \"{:02x}\" }}",
        u8::from(value.subtype)
    );
}

fn write_object_id(out: &mut String, oid: ObjectId) {
    let _ = write!(out, "{{ \"$oid\" : \"{}\" }}", oid.to_hex());
}

fn write_timestamp(out: &mut String, ts: Timestamp) {
    let _ = write!(
        out,
        "{{ \"$timestamp\" : {{ \"t\" : {}, \"i\" : {} }} }}",
        ts.time, ts.increment
    );
}

fn write_regex(out: &mut String, regex: RawRegexRef<'_>) {
    out.push_str("{ \"$regex\" : ");
    write_string(out, regex.pattern);
    out.push_str(", \"$options\" : ");
    write_string(out, regex.options);
    out.push_str(" }");
}

fn write_db_pointer(out: &mut String, pointer: RawDbPointerRef<'_>) {
    out.push_str("{ \"$dbPointer\" : { \"$ref\" : ");
    write_string(out, pointer.namespace());
    out.push_str(", \"$id\" : ");
    write_object_id(out, pointer.id());
    out.push_str(" } }");
}

/// Appends any value to `out`. Documents and arrays nested inside `value` start at `depth + 1`.
fn write_value(out: &mut String, value: RawBsonRef<'_>, depth: usize) -> Result<()> {
    match value {
        RawBsonRef::Double(d) => write_double(out, d),
        RawBsonRef::String(s) => write_string(out, s),
        RawBsonRef::Document(doc) => write_container(out, doc, false, depth + 1)?,
        RawBsonRef::Array(array) => write_container(out, array.as_doc(), true, depth + 1)?,
        RawBsonRef::Binary(b) => write_binary(out, b),
        RawBsonRef::Undefined => out.push_str("{ \"$undefined\" : true }"),
        RawBsonRef::ObjectId(oid) => write_object_id(out, oid),
        RawBsonRef::Boolean(b) => out.push_str(if b { "true" } else { "false" }),
        RawBsonRef::DateTime(dt) => {
            let _ = write!(out, "{{ \"$date\" : {} }}", dt.timestamp_millis());
        }
        RawBsonRef::Null => out.push_str("null"),
        RawBsonRef::RegularExpression(re) => write_regex(out, re),
        RawBsonRef::DbPointer(p) => write_db_pointer(out, p),
        RawBsonRef::JavaScriptCode(code) => {
            out.push_str("{ \"$code\" : ");
            write_string(out, code);
            out.push_str(" }");
        }
        RawBsonRef::Symbol(symbol) => {
            out.push_str("{ \"$symbol\" : ");
            write_string(out, symbol);
            out.push_str(" }");
        }
        RawBsonRef::JavaScriptCodeWithScope(cws) => {
            out.push_str("{ \"$code\" : ");
            write_string(out, cws.code);
            out.push_str(", \"$scope\" : ");
            // The scope follows the total length and the code's length, bytes and nul.
            let scope_start = 4 + 4 + cws.code.len() + 1;
            write_container(out, cws.scope, false, depth + 1).map_err(|mut error| {
                error.offset = error.offset.map(|offset| scope_start + offset);
                error
            })?;
            out.push_str(" }");
        }
        RawBsonRef::Int32(i) => {
            let _ = write!(out, "{i}");
        }
        RawBsonRef::Timestamp(ts) => write_timestamp(out, ts),
        RawBsonRef::Int64(i) => {
            let _ = write!(out, "{{ \"$numberLong\" : \"{i}\" }}");
        }
        RawBsonRef::MaxKey => out.push_str("{ \"$maxKey\" : 1 }"),
        RawBsonRef::MinKey => out.push_str("{ \"$minKey\" : 1 }"),
    }
    Ok(())
}

/// Appends a document, or an array when `array` is set, at nesting level `depth`.
fn write_container(out: &mut String, doc: &RawDocument, array: bool, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::depth_exceeded());
    }
    let mut renderer = Renderer {
        out,
        array,
        depth,
        count: 0,
        base: 0,
        error: None,
    };
    renderer.open();
    let outcome = visit_all(doc, &mut renderer);
    renderer.finish(outcome)
}

struct Renderer<'s> {
    out: &'s mut String,
    array: bool,
    depth: usize,
    count: usize,
    /// Offset of the current element's payload, for errors from nested containers.
    base: usize,
    error: Option<Error>,
}

impl Renderer<'_> {
    fn open(&mut self) {
        self.out.push(if self.array { '[' } else { '{' });
    }

    fn finish(self, outcome: Visit) -> Result<()> {
        if let Some(error) = self.error {
            return Err(error);
        }
        match outcome {
            Visit::Completed => {
                self.out.push_str(if self.array { " ]" } else { " }" });
                Ok(())
            }
            Visit::Stopped { offset } => Err(Error::from(ErrorKind::Utf8Encoding).with_offset(offset)),
            Visit::Corrupt { offset } => {
                Err(Error::malformed_value("corrupt element").with_offset(offset))
            }
        }
    }

    fn value(&mut self, value: RawBsonRef<'_>) -> ControlFlow<()> {
        match write_value(self.out, value, self.depth) {
            Ok(()) => ControlFlow::Continue(()),
            Err(mut error) => {
                // Offsets from nested containers are relative to their own start.
                error.offset = error.offset.map(|offset| self.base + offset);
                self.error = Some(error);
                ControlFlow::Break(())
            }
        }
    }
}

impl<'a> Visitor<'a> for Renderer<'_> {
    fn visit_before(&mut self, element: &RawElement<'a>) -> ControlFlow<()> {
        self.out.push_str(if self.count == 0 { " " } else { ", " });
        self.count += 1;
        self.base = element.value_offset();
        if !self.array {
            match element.key() {
                Ok(key) => {
                    write_string(self.out, key);
                    self.out.push_str(" : ");
                }
                Err(_) => return ControlFlow::Break(()),
            }
        }
        ControlFlow::Continue(())
    }

    fn visit_double(&mut self, _key: &'a str, value: f64) -> ControlFlow<()> {
        self.value(RawBsonRef::Double(value))
    }

    fn visit_string(&mut self, _key: &'a str, value: &'a str) -> ControlFlow<()> {
        self.value(RawBsonRef::String(value))
    }

    fn visit_document(&mut self, _key: &'a str, value: &'a RawDocument) -> ControlFlow<()> {
        self.value(RawBsonRef::Document(value))
    }

    fn visit_array(&mut self, _key: &'a str, value: &'a RawArray) -> ControlFlow<()> {
        self.value(RawBsonRef::Array(value))
    }

    fn visit_binary(&mut self, _key: &'a str, value: RawBinaryRef<'a>) -> ControlFlow<()> {
        self.value(RawBsonRef::Binary(value))
    }

    fn visit_undefined(&mut self, _key: &'a str) -> ControlFlow<()> {
        self.value(RawBsonRef::Undefined)
    }

    fn visit_object_id(&mut self, _key: &'a str, value: ObjectId) -> ControlFlow<()> {
        self.value(RawBsonRef::ObjectId(value))
    }

    fn visit_bool(&mut self, _key: &'a str, value: bool) -> ControlFlow<()> {
        self.value(RawBsonRef::Boolean(value))
    }

    fn visit_datetime(&mut self, _key: &'a str, value: DateTime) -> ControlFlow<()> {
        self.value(RawBsonRef::DateTime(value))
    }

    fn visit_null(&mut self, _key: &'a str) -> ControlFlow<()> {
        self.value(RawBsonRef::Null)
    }

    fn visit_regex(&mut self, _key: &'a str, value: RawRegexRef<'a>) -> ControlFlow<()> {
        self.value(RawBsonRef::RegularExpression(value))
    }

    fn visit_db_pointer(&mut self, _key: &'a str, value: RawDbPointerRef<'a>) -> ControlFlow<()> {
        self.value(RawBsonRef::DbPointer(value))
    }

    fn visit_code(&mut self, _key: &'a str, value: &'a str) -> ControlFlow<()> {
        self.value(RawBsonRef::JavaScriptCode(value))
    }

    fn visit_symbol(&mut self, _key: &'a str, value: &'a str) -> ControlFlow<()> {
        self.value(RawBsonRef::Symbol(value))
    }

    fn visit_code_with_scope(
        &mut self,
        _key: &'a str,
        value: RawJavaScriptCodeWithScopeRef<'a>,
    ) -> ControlFlow<()> {
        self.value(RawBsonRef::JavaScriptCodeWithScope(value))
    }

    fn visit_int32(&mut self, _key: &'a str, value: i32) -> ControlFlow<()> {
        self.value(RawBsonRef::Int32(value))
    }

    fn visit_timestamp(&mut self, _key: &'a str, value: Timestamp) -> ControlFlow<()> {
        self.value(RawBsonRef::Timestamp(value))
    }

    fn visit_int64(&mut self, _key: &'a str, value: i64) -> ControlFlow<()> {
        self.value(RawBsonRef::Int64(value))
    }

    fn visit_max_key(&mut self, _key: &'a str) -> ControlFlow<()> {
        self.value(RawBsonRef::MaxKey)
    }

    fn visit_min_key(&mut self, _key: &'a str) -> ControlFlow<()> {
        self.value(RawBsonRef::MinKey)
    }
}

impl RawDocument {
    /// Renders the document as extended JSON. Fails if any key or string is not valid UTF-8 or
    /// an element is corrupt; no partial text is returned.
    ///
    /// ```
    /// use bson_core::{oid::ObjectId, raw::RawDocumentBuf, DateTime};
    ///
    /// let oid = ObjectId::parse_str("507f1f77bcf86cd799439011")?;
    /// let mut doc = RawDocumentBuf::new();
    /// doc.append("id", oid)?;
    /// doc.append("when", DateTime::from_millis(0))?;
    ///
    /// assert_eq!(
    ///     doc.to_json()?,
    ///     r#"{ "id" : { "$oid" : "507f1f77bcf86cd799439011" }, "when" : { "$date" : 0 } }"#,
    /// );
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn to_json(&self) -> Result<String> {
        let mut out = String::with_capacity(self.as_bytes().len() * 2);
        write_container(&mut out, self, false, 0)?;
        Ok(out)
    }
}

impl RawArray {
    /// Renders the array as a JSON array of extended JSON values.
    pub fn to_json(&self) -> Result<String> {
        let mut out = String::with_capacity(self.as_bytes().len() * 2);
        write_container(&mut out, self.as_doc(), true, 0)?;
        Ok(out)
    }
}

impl RawBsonRef<'_> {
    /// Renders a single value as extended JSON.
    ///
    /// ```
    /// use bson_core::raw::RawBsonRef;
    ///
    /// assert_eq!(RawBsonRef::Double(1.0).to_json()?, "1.0");
    /// assert_eq!(RawBsonRef::Int64(5).to_json()?, r#"{ "$numberLong" : "5" }"#);
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn to_json(&self) -> Result<String> {
        let mut out = String::new();
        write_value(&mut out, *self, 0)?;
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{format_double, write_string};
    use crate::raw::{RawDocument, RawDocumentBuf};

    #[test]
    fn doubles() {
        assert_eq!(format_double(1.0), "1.0");
        assert_eq!(format_double(-0.0), "-0.0");
        assert_eq!(format_double(0.5), "0.5");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(1e20), "1e+20");
        assert_eq!(format_double(1.5e-7), "1.5e-07");
        assert_eq!(format_double(123456.789), "123456.789");
        // 15 digits print 0.3 here, which reads back as a different double.
        assert_eq!(format_double(0.1 + 0.2), "0.30000000000000004");
        for value in [f64::MAX, f64::MIN_POSITIVE, std::f64::consts::PI, -2.5e300] {
            assert_eq!(format_double(value).parse::<f64>().unwrap(), value);
        }
    }

    #[test]
    fn escapes() {
        let mut out = String::new();
        write_string(&mut out, "a\"b\\c/d\n\u{1}é");
        assert_eq!(out, r#""a\"b\\c\/d\n\u0001é""#);
    }

    #[test]
    fn empty_containers() {
        let doc = RawDocumentBuf::from_json(r#"{"a": {}, "b": []}"#).unwrap();
        assert_eq!(doc.to_json().unwrap(), r#"{ "a" : { }, "b" : [ ] }"#);
        assert_eq!(RawDocumentBuf::new().to_json().unwrap(), "{ }");
    }

    #[test]
    fn invalid_utf8_fails_the_whole_render() {
        // { "s": "\xff" }
        let bytes = b"\x0e\x00\x00\x00\x02s\x00\x02\x00\x00\x00\xff\x00\x00";
        let doc = RawDocument::from_bytes(bytes).unwrap();
        let err = doc.to_json().unwrap_err();
        assert_eq!(err.offset, Some(4));
    }
}
