//! Callback-driven traversal of a document's top-level elements.
//!
//! [`visit_all`] walks a document with a [`RawIter`](super::RawIter) and hands each element to a
//! [`Visitor`]: first [`Visitor::visit_before`], then the callback for the element's type, then
//! [`Visitor::visit_after`]. Any callback can stop the walk by returning
//! [`ControlFlow::Break`]. Every method has a default that continues, so a visitor only overrides
//! what it cares about. Nested documents are not entered automatically; a visitor that wants to
//! descend calls [`visit_all`] again from [`Visitor::visit_document`].

use std::ops::ControlFlow;

use crate::{
    bson::Timestamp,
    oid::ObjectId,
    raw::{
        RawArray,
        RawBinaryRef,
        RawBsonRef,
        RawDbPointerRef,
        RawDocument,
        RawElement,
        RawJavaScriptCodeWithScopeRef,
        RawRegexRef,
    },
    DateTime,
};

/// How a call to [`visit_all`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Every element was visited.
    Completed,

    /// A callback returned [`ControlFlow::Break`] while visiting the element at `offset`.
    Stopped { offset: usize },

    /// The element at `offset` is corrupt. [`Visitor::visit_corrupt`] has been called.
    Corrupt { offset: usize },
}

#[allow(unused_variables)]
pub trait Visitor<'a> {
    /// Called before an element's value is decoded.
    fn visit_before(&mut self, element: &RawElement<'a>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called after the element's type callback, unless it stopped the walk.
    fn visit_after(&mut self, element: &RawElement<'a>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called once when the walk reaches a corrupt element.
    fn visit_corrupt(&mut self, offset: usize) {}

    /// Called when the element's key or a string in its value is not valid UTF-8. If this
    /// continues the walk, the type callback for the element is skipped.
    fn visit_invalid_utf8(&mut self, element: &RawElement<'a>) -> ControlFlow<()> {
        ControlFlow::Break(())
    }

    fn visit_double(&mut self, key: &'a str, value: f64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_string(&mut self, key: &'a str, value: &'a str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_document(&mut self, key: &'a str, value: &'a RawDocument) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_array(&mut self, key: &'a str, value: &'a RawArray) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_binary(&mut self, key: &'a str, value: RawBinaryRef<'a>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_undefined(&mut self, key: &'a str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_object_id(&mut self, key: &'a str, value: ObjectId) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_bool(&mut self, key: &'a str, value: bool) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_datetime(&mut self, key: &'a str, value: DateTime) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_null(&mut self, key: &'a str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_regex(&mut self, key: &'a str, value: RawRegexRef<'a>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_db_pointer(&mut self, key: &'a str, value: RawDbPointerRef<'a>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_code(&mut self, key: &'a str, value: &'a str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_symbol(&mut self, key: &'a str, value: &'a str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_code_with_scope(
        &mut self,
        key: &'a str,
        value: RawJavaScriptCodeWithScopeRef<'a>,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_int32(&mut self, key: &'a str, value: i32) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_timestamp(&mut self, key: &'a str, value: Timestamp) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_int64(&mut self, key: &'a str, value: i64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_max_key(&mut self, key: &'a str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_min_key(&mut self, key: &'a str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

fn dispatch<'a, V: Visitor<'a> + ?Sized>(
    visitor: &mut V,
    key: &'a str,
    value: RawBsonRef<'a>,
) -> ControlFlow<()> {
    match value {
        RawBsonRef::Double(d) => visitor.visit_double(key, d),
        RawBsonRef::String(s) => visitor.visit_string(key, s),
        RawBsonRef::Document(d) => visitor.visit_document(key, d),
        RawBsonRef::Array(a) => visitor.visit_array(key, a),
        RawBsonRef::Binary(b) => visitor.visit_binary(key, b),
        RawBsonRef::Undefined => visitor.visit_undefined(key),
        RawBsonRef::ObjectId(oid) => visitor.visit_object_id(key, oid),
        RawBsonRef::Boolean(b) => visitor.visit_bool(key, b),
        RawBsonRef::DateTime(dt) => visitor.visit_datetime(key, dt),
        RawBsonRef::Null => visitor.visit_null(key),
        RawBsonRef::RegularExpression(re) => visitor.visit_regex(key, re),
        RawBsonRef::DbPointer(p) => visitor.visit_db_pointer(key, p),
        RawBsonRef::JavaScriptCode(c) => visitor.visit_code(key, c),
        RawBsonRef::Symbol(s) => visitor.visit_symbol(key, s),
        RawBsonRef::JavaScriptCodeWithScope(cws) => visitor.visit_code_with_scope(key, cws),
        RawBsonRef::Int32(i) => visitor.visit_int32(key, i),
        RawBsonRef::Timestamp(ts) => visitor.visit_timestamp(key, ts),
        RawBsonRef::Int64(i) => visitor.visit_int64(key, i),
        RawBsonRef::MaxKey => visitor.visit_max_key(key),
        RawBsonRef::MinKey => visitor.visit_min_key(key),
    }
}

/// Walks the top-level elements of `doc`, calling `visitor` for each.
///
/// ```
/// use std::ops::ControlFlow;
/// use bson_core::raw::{visit_all, RawDocumentBuf, Visit, Visitor};
///
/// #[derive(Default)]
/// struct SumInts(i64);
///
/// impl<'a> Visitor<'a> for SumInts {
///     fn visit_int32(&mut self, _key: &'a str, value: i32) -> ControlFlow<()> {
///         self.0 += value as i64;
///         ControlFlow::Continue(())
///     }
/// }
///
/// let doc = RawDocumentBuf::from_json(r#"{ "a": 1, "b": "x", "c": 2 }"#)?;
/// let mut sum = SumInts::default();
/// assert_eq!(visit_all(&doc, &mut sum), Visit::Completed);
/// assert_eq!(sum.0, 3);
/// # Ok::<(), bson_core::error::Error>(())
/// ```
pub fn visit_all<'a, V: Visitor<'a> + ?Sized>(doc: &'a RawDocument, visitor: &mut V) -> Visit {
    let mut iter = doc.iter_elements();
    while let Some(result) = iter.next() {
        let element = match result {
            Ok(element) => element,
            Err(_) => {
                let offset = iter.error_offset().unwrap_or_default();
                visitor.visit_corrupt(offset);
                return Visit::Corrupt { offset };
            }
        };
        let stopped = Visit::Stopped {
            offset: element.offset(),
        };

        if visitor.visit_before(&element).is_break() {
            return stopped;
        }
        let flow = match (element.key(), element.value()) {
            (Ok(key), Ok(value)) => dispatch(visitor, key, value),
            _ => visitor.visit_invalid_utf8(&element),
        };
        if flow.is_break() || visitor.visit_after(&element).is_break() {
            return stopped;
        }
    }
    Visit::Completed
}
