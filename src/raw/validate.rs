//! Document validation beyond framing: UTF-8, embedded nul bytes, and key rules.

use std::ops::ControlFlow;

use crate::{
    error::{Error, Result, ValidationErrorKind},
    raw::{
        i32_from_slice,
        visit_all,
        RawArray,
        RawDocument,
        RawElement,
        RawJavaScriptCodeWithScopeRef,
        Visit,
        Visitor,
        MAX_DEPTH,
    },
    spec::ElementType,
};

/// Which checks [`RawDocument::validate`] performs. Framing is always checked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ValidateOptions {
    /// Reject keys and string values that are not valid UTF-8.
    pub utf8: bool,

    /// When checking UTF-8, accept string values containing nul bytes.
    pub utf8_allow_null: bool,

    /// Reject keys beginning with `$`, except a well-formed `$ref`, `$id`, `$db` sequence at
    /// the start of an embedded document.
    pub dollar_keys: bool,

    /// Reject keys containing `.`.
    pub dot_keys: bool,
}

impl ValidateOptions {
    /// Sets [`ValidateOptions::utf8`].
    pub fn utf8(mut self, utf8: bool) -> Self {
        self.utf8 = utf8;
        self
    }

    /// Sets [`ValidateOptions::utf8_allow_null`].
    pub fn utf8_allow_null(mut self, allow: bool) -> Self {
        self.utf8_allow_null = allow;
        self
    }

    /// Sets [`ValidateOptions::dollar_keys`].
    pub fn dollar_keys(mut self, dollar_keys: bool) -> Self {
        self.dollar_keys = dollar_keys;
        self
    }

    /// Sets [`ValidateOptions::dot_keys`].
    pub fn dot_keys(mut self, dot_keys: bool) -> Self {
        self.dot_keys = dot_keys;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbRef {
    /// No key seen yet.
    Start,
    /// `$ref` seen; `$id` must come next.
    ExpectId,
    /// `$ref`, `$id` seen; `$db` may come next.
    ExpectDb,
    /// Not a DBRef, or the DBRef prefix is complete.
    Done,
}

struct Validator<'o> {
    options: &'o ValidateOptions,
    /// Absolute offset of the document being validated.
    base: usize,
    depth: usize,
    dbref: DbRef,
    /// Offset of the current element's payload within the document.
    value_offset: usize,
    error: Option<Error>,
}

impl<'o> Validator<'o> {
    fn new(options: &'o ValidateOptions, base: usize, depth: usize) -> Self {
        Self {
            options,
            base,
            depth,
            dbref: DbRef::Start,
            value_offset: 0,
            error: None,
        }
    }

    fn fail(&mut self, error: Error) -> ControlFlow<()> {
        self.error = Some(error);
        ControlFlow::Break(())
    }

    fn invalid(&mut self, kind: ValidationErrorKind, offset: usize) -> ControlFlow<()> {
        self.fail(Error::validation(kind, self.base + offset))
    }

    fn check_dollar_key(&mut self, element: &RawElement<'_>, key: &str) -> ControlFlow<()> {
        let offset = element.offset();
        let is_string = element.element_type() == ElementType::String;
        let dbref_error = |message| ValidationErrorKind::InvalidDbRef { message };

        // DBRef fields are only meaningful inside an embedded document.
        if self.depth == 0 {
            if key.starts_with('$') {
                return self.invalid(ValidationErrorKind::DollarKey, offset);
            }
            return ControlFlow::Continue(());
        }

        match (self.dbref, key) {
            (DbRef::Start, "$ref") => {
                if !is_string {
                    return self.invalid(dbref_error("$ref must be a string"), offset);
                }
                self.dbref = DbRef::ExpectId;
            }
            (DbRef::ExpectId, "$id") => self.dbref = DbRef::ExpectDb,
            (DbRef::ExpectId, _) => {
                return self.invalid(dbref_error("$ref must be followed by $id"), offset);
            }
            (DbRef::ExpectDb, "$db") => {
                if !is_string {
                    return self.invalid(dbref_error("$db must be a string"), offset);
                }
                self.dbref = DbRef::Done;
            }
            (_, "$id") | (_, "$db") => {
                return self.invalid(dbref_error("$id and $db must follow $ref"), offset);
            }
            (_, key) if key.starts_with('$') => {
                return self.invalid(ValidationErrorKind::DollarKey, offset);
            }
            _ => self.dbref = DbRef::Done,
        }
        ControlFlow::Continue(())
    }

    fn check_string(&mut self, value: &str) -> ControlFlow<()> {
        if self.options.utf8 && !self.options.utf8_allow_null && value.contains('\0') {
            let offset = self.value_offset;
            return self.invalid(ValidationErrorKind::EmbeddedNull, offset);
        }
        ControlFlow::Continue(())
    }

    fn descend(&mut self, doc: &RawDocument, relative_offset: usize) -> ControlFlow<()> {
        let base = self.base + relative_offset;
        if self.depth + 1 > MAX_DEPTH {
            return self.fail(Error::depth_exceeded().with_offset(base));
        }
        match validate_at(doc, self.options, base, self.depth + 1) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => self.fail(e),
        }
    }

    fn finish(mut self, outcome: Visit, doc_len: usize) -> Result<()> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        match outcome {
            Visit::Completed if self.dbref == DbRef::ExpectId => Err(Error::validation(
                ValidationErrorKind::InvalidDbRef {
                    message: "$ref without $id",
                },
                self.base + doc_len - 1,
            )),
            Visit::Completed => Ok(()),
            Visit::Stopped { offset } | Visit::Corrupt { offset } => {
                Err(Error::malformed_value("corrupt element").with_offset(self.base + offset))
            }
        }
    }
}

impl<'a> Visitor<'a> for Validator<'_> {
    fn visit_before(&mut self, element: &RawElement<'a>) -> ControlFlow<()> {
        self.value_offset = element.value_offset();
        let key = match element.key() {
            Ok(key) => key,
            // Reported by visit_invalid_utf8.
            Err(_) => return ControlFlow::Continue(()),
        };
        if self.options.dot_keys && key.contains('.') {
            return self.invalid(ValidationErrorKind::DotKey, element.offset());
        }
        if self.options.dollar_keys {
            return self.check_dollar_key(element, key);
        }
        ControlFlow::Continue(())
    }

    fn visit_invalid_utf8(&mut self, element: &RawElement<'a>) -> ControlFlow<()> {
        if self.options.utf8 {
            return self.invalid(ValidationErrorKind::InvalidUtf8, element.offset());
        }
        // The type callbacks were skipped, but nested framing must still be checked.
        let bytes = element.value_bytes();
        let at = element.value_offset();
        match element.element_type() {
            ElementType::EmbeddedDocument | ElementType::Array => {
                self.descend(RawDocument::new_unchecked(bytes), at)
            }
            ElementType::JavaScriptCodeWithScope => {
                let code_len = match i32_from_slice(&bytes[4..]) {
                    Ok(len) => len as usize,
                    Err(e) => return self.fail(e.with_offset(self.base + at)),
                };
                let scope_start = 4 + 4 + code_len;
                self.descend(RawDocument::new_unchecked(&bytes[scope_start..]), at + scope_start)
            }
            _ => ControlFlow::Continue(()),
        }
    }

    fn visit_string(&mut self, _key: &'a str, value: &'a str) -> ControlFlow<()> {
        self.check_string(value)
    }

    fn visit_code(&mut self, _key: &'a str, value: &'a str) -> ControlFlow<()> {
        self.check_string(value)
    }

    fn visit_symbol(&mut self, _key: &'a str, value: &'a str) -> ControlFlow<()> {
        self.check_string(value)
    }

    fn visit_document(&mut self, _key: &'a str, value: &'a RawDocument) -> ControlFlow<()> {
        self.descend(value, self.value_offset)
    }

    fn visit_array(&mut self, _key: &'a str, value: &'a RawArray) -> ControlFlow<()> {
        self.descend(value.as_doc(), self.value_offset)
    }

    fn visit_code_with_scope(
        &mut self,
        _key: &'a str,
        value: RawJavaScriptCodeWithScopeRef<'a>,
    ) -> ControlFlow<()> {
        if self.check_string(value.code).is_break() {
            return ControlFlow::Break(());
        }
        let scope_offset = self.value_offset + 4 + 4 + value.code.len() + 1;
        self.descend(value.scope, scope_offset)
    }
}

fn validate_at(
    doc: &RawDocument,
    options: &ValidateOptions,
    base: usize,
    depth: usize,
) -> Result<()> {
    let mut validator = Validator::new(options, base, depth);
    let outcome = visit_all(doc, &mut validator);
    validator.finish(outcome, doc.as_bytes().len())
}

impl RawDocument {
    /// Checks every element, recursing into embedded documents, arrays and code-with-scope
    /// scopes. Errors carry the absolute offset of the offending element.
    ///
    /// ```
    /// use bson_core::raw::{RawDocumentBuf, ValidateOptions};
    ///
    /// let mut doc = RawDocumentBuf::new();
    /// doc.append("a.b", 1)?;
    /// assert!(doc.validate(&ValidateOptions::default()).is_ok());
    ///
    /// let err = doc.validate(&ValidateOptions::default().dot_keys(true)).unwrap_err();
    /// assert_eq!(err.offset, Some(4));
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn validate(&self, options: &ValidateOptions) -> Result<()> {
        validate_at(self, options, 0, 0)
    }
}
