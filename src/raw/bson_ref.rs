use crate::{
    bson::{DbPointer, Regex, Timestamp},
    oid::ObjectId,
    raw::{RawArray, RawArrayBuf, RawBson, RawDocument, RawDocumentBuf, RawJavaScriptCodeWithScope},
    spec::{BinarySubtype, ElementType},
    Binary,
    DateTime,
};

/// A value borrowed from an encoded document.
///
/// Variants are listed in element tag order. Strings, documents, arrays and binary payloads
/// point into the document's bytes; everything else is decoded by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawBsonRef<'a> {
    Double(f64),
    String(&'a str),
    Document(&'a RawDocument),
    Array(&'a RawArray),
    Binary(RawBinaryRef<'a>),
    /// Deprecated.
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    DateTime(DateTime),
    Null,
    RegularExpression(RawRegexRef<'a>),
    /// Deprecated.
    DbPointer(RawDbPointerRef<'a>),
    JavaScriptCode(&'a str),
    /// Deprecated.
    Symbol(&'a str),
    JavaScriptCodeWithScope(RawJavaScriptCodeWithScopeRef<'a>),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    MaxKey,
    MinKey,
}

/// Generates `as_*` accessors returning the payload of one variant.
macro_rules! accessors {
    ($($(#[$doc:meta])* $name:ident => $variant:ident($ty:ty);)*) => {
        $(
            $(#[$doc])*
            pub fn $name(self) -> Option<$ty> {
                match self {
                    RawBsonRef::$variant(value) => Some(value),
                    _ => None,
                }
            }
        )*
    };
}

impl<'a> RawBsonRef<'a> {
    pub fn element_type(&self) -> ElementType {
        use ElementType as T;
        match self {
            Self::Double(_) => T::Double,
            Self::String(_) => T::String,
            Self::Document(_) => T::EmbeddedDocument,
            Self::Array(_) => T::Array,
            Self::Binary(_) => T::Binary,
            Self::Undefined => T::Undefined,
            Self::ObjectId(_) => T::ObjectId,
            Self::Boolean(_) => T::Boolean,
            Self::DateTime(_) => T::DateTime,
            Self::Null => T::Null,
            Self::RegularExpression(_) => T::RegularExpression,
            Self::DbPointer(_) => T::DbPointer,
            Self::JavaScriptCode(_) => T::JavaScriptCode,
            Self::Symbol(_) => T::Symbol,
            Self::JavaScriptCodeWithScope(_) => T::JavaScriptCodeWithScope,
            Self::Int32(_) => T::Int32,
            Self::Timestamp(_) => T::Timestamp,
            Self::Int64(_) => T::Int64,
            Self::MaxKey => T::MaxKey,
            Self::MinKey => T::MinKey,
        }
    }

    accessors! {
        as_f64 => Double(f64);
        /// The string, if this is a UTF-8 string value. Code and symbols are not included.
        as_str => String(&'a str);
        as_document => Document(&'a RawDocument);
        as_array => Array(&'a RawArray);
        as_binary => Binary(RawBinaryRef<'a>);
        as_object_id => ObjectId(ObjectId);
        as_bool => Boolean(bool);
        as_datetime => DateTime(DateTime);
        as_regex => RegularExpression(RawRegexRef<'a>);
        as_db_pointer => DbPointer(RawDbPointerRef<'a>);
        as_javascript => JavaScriptCode(&'a str);
        as_symbol => Symbol(&'a str);
        as_javascript_with_scope => JavaScriptCodeWithScope(RawJavaScriptCodeWithScopeRef<'a>);
        as_i32 => Int32(i32);
        as_timestamp => Timestamp(Timestamp);
        as_i64 => Int64(i64);
    }

    pub fn is_null(self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness: numbers are true when non-zero, null and undefined are false, and every
    /// other value is true.
    pub fn as_bool_lossy(self) -> bool {
        match self {
            Self::Boolean(b) => b,
            Self::Double(d) => d != 0.0,
            Self::Int32(i) => i != 0,
            Self::Int64(i) => i != 0,
            Self::Null | Self::Undefined => false,
            _ => true,
        }
    }

    /// Any numeric or boolean value as an `i64`. Doubles are truncated towards zero and
    /// saturate at the `i64` bounds; NaN becomes zero.
    pub fn as_i64_lossy(self) -> Option<i64> {
        match self {
            Self::Boolean(b) => Some(i64::from(b)),
            Self::Double(d) => Some(d as i64),
            Self::Int32(i) => Some(i64::from(i)),
            Self::Int64(i) => Some(i),
            _ => None,
        }
    }

    /// Deep-copies the value, including any document bytes it points to.
    pub fn to_raw_bson(self) -> RawBson {
        match self {
            Self::Double(d) => RawBson::Double(d),
            Self::String(s) => RawBson::String(s.to_owned()),
            Self::Document(d) => RawBson::Document(d.to_raw_document_buf()),
            Self::Array(a) => RawBson::Array(a.to_raw_array_buf()),
            Self::Binary(b) => RawBson::Binary(b.to_binary()),
            Self::Undefined => RawBson::Undefined,
            Self::ObjectId(oid) => RawBson::ObjectId(oid),
            Self::Boolean(b) => RawBson::Boolean(b),
            Self::DateTime(dt) => RawBson::DateTime(dt),
            Self::Null => RawBson::Null,
            Self::RegularExpression(re) => RawBson::RegularExpression(Regex {
                pattern: re.pattern.to_owned(),
                options: re.options.to_owned(),
            }),
            Self::DbPointer(p) => RawBson::DbPointer(DbPointer::new(p.namespace, p.id)),
            Self::JavaScriptCode(code) => RawBson::JavaScriptCode(code.to_owned()),
            Self::Symbol(s) => RawBson::Symbol(s.to_owned()),
            Self::JavaScriptCodeWithScope(cws) => {
                RawBson::JavaScriptCodeWithScope(RawJavaScriptCodeWithScope {
                    code: cws.code.to_owned(),
                    scope: cws.scope.to_raw_document_buf(),
                })
            }
            Self::Int32(i) => RawBson::Int32(i),
            Self::Timestamp(ts) => RawBson::Timestamp(ts),
            Self::Int64(i) => RawBson::Int64(i),
            Self::MaxKey => RawBson::MaxKey,
            Self::MinKey => RawBson::MinKey,
        }
    }
}

/// `From` conversions for values that map directly onto one variant.
macro_rules! from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<$ty> for RawBsonRef<'a> {
                fn from(value: $ty) -> Self {
                    RawBsonRef::$variant(value)
                }
            }
        )*
    };
}

from_value! {
    f64 => Double,
    &'a str => String,
    &'a RawDocument => Document,
    &'a RawArray => Array,
    RawBinaryRef<'a> => Binary,
    ObjectId => ObjectId,
    bool => Boolean,
    DateTime => DateTime,
    RawRegexRef<'a> => RegularExpression,
    RawDbPointerRef<'a> => DbPointer,
    RawJavaScriptCodeWithScopeRef<'a> => JavaScriptCodeWithScope,
    i32 => Int32,
    Timestamp => Timestamp,
    i64 => Int64,
}

impl<'a> From<&'a String> for RawBsonRef<'a> {
    fn from(s: &'a String) -> Self {
        RawBsonRef::String(s)
    }
}

impl<'a> From<&'a RawDocumentBuf> for RawBsonRef<'a> {
    fn from(d: &'a RawDocumentBuf) -> Self {
        RawBsonRef::Document(d)
    }
}

impl<'a> From<&'a RawArrayBuf> for RawBsonRef<'a> {
    fn from(a: &'a RawArrayBuf) -> Self {
        RawBsonRef::Array(a)
    }
}

impl<'a> From<&'a Binary> for RawBsonRef<'a> {
    fn from(b: &'a Binary) -> Self {
        RawBsonRef::Binary(b.as_raw_binary())
    }
}

impl<'a> From<&'a Regex> for RawBsonRef<'a> {
    fn from(re: &'a Regex) -> Self {
        RawBsonRef::RegularExpression(re.as_raw_regex())
    }
}

impl<'a> From<&'a DbPointer> for RawBsonRef<'a> {
    fn from(p: &'a DbPointer) -> Self {
        RawBsonRef::DbPointer(p.as_raw_db_pointer())
    }
}

/// A binary payload borrowed from a document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawBinaryRef<'a> {
    pub subtype: BinarySubtype,
    /// For [`BinarySubtype::BinaryOld`] this excludes the inner length prefix.
    pub bytes: &'a [u8],
}

impl RawBinaryRef<'_> {
    pub fn to_binary(&self) -> Binary {
        Binary::new(self.subtype, self.bytes)
    }
}

/// A regular expression borrowed from a document. Options are exactly as stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawRegexRef<'a> {
    pub pattern: &'a str,
    pub options: &'a str,
}

/// JavaScript code and the document of variables it runs with, borrowed from a document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawJavaScriptCodeWithScopeRef<'a> {
    pub code: &'a str,
    pub scope: &'a RawDocument,
}

/// A namespace and ObjectId borrowed from a deprecated DBPointer element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDbPointerRef<'a> {
    pub(crate) namespace: &'a str,
    pub(crate) id: ObjectId,
}

impl<'a> RawDbPointerRef<'a> {
    pub fn new(namespace: &'a str, id: ObjectId) -> Self {
        Self { namespace, id }
    }

    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }
}
