use crate::{
    bson::{DbPointer, Regex, Timestamp},
    oid::ObjectId,
    raw::{
        RawArray,
        RawArrayBuf,
        RawBsonRef,
        RawDocument,
        RawDocumentBuf,
        RawJavaScriptCodeWithScopeRef,
    },
    spec::ElementType,
    Binary,
    DateTime,
};

/// An owned value, the counterpart of [`RawBsonRef`].
///
/// Each variant owns exactly its own payload: cloning copies that payload, including the bytes of
/// nested documents and arrays, and nothing is shared between clones.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBson {
    Double(f64),
    String(String),
    Document(RawDocumentBuf),
    Array(RawArrayBuf),
    Binary(Binary),
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime),
    Null,
    RegularExpression(Regex),
    DbPointer(DbPointer),
    JavaScriptCode(String),
    Symbol(String),
    JavaScriptCodeWithScope(RawJavaScriptCodeWithScope),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    MaxKey,
    MinKey,
}

impl RawBson {
    pub fn element_type(&self) -> ElementType {
        self.as_raw_bson_ref().element_type()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_raw_bson_ref().as_f64()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_raw_bson_ref().as_str()
    }

    pub fn as_document(&self) -> Option<&RawDocument> {
        self.as_raw_bson_ref().as_document()
    }

    pub fn as_array(&self) -> Option<&RawArray> {
        self.as_raw_bson_ref().as_array()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_raw_bson_ref().as_bool()
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_raw_bson_ref().as_i32()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_raw_bson_ref().as_i64()
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        self.as_raw_bson_ref().as_object_id()
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        self.as_raw_bson_ref().as_datetime()
    }

    /// Borrows the value without copying.
    pub fn as_raw_bson_ref(&self) -> RawBsonRef<'_> {
        match self {
            RawBson::Double(d) => RawBsonRef::Double(*d),
            RawBson::String(s) => RawBsonRef::String(s),
            RawBson::Document(d) => RawBsonRef::Document(d),
            RawBson::Array(a) => RawBsonRef::Array(a),
            RawBson::Binary(b) => RawBsonRef::Binary(b.as_raw_binary()),
            RawBson::Undefined => RawBsonRef::Undefined,
            RawBson::ObjectId(oid) => RawBsonRef::ObjectId(*oid),
            RawBson::Boolean(b) => RawBsonRef::Boolean(*b),
            RawBson::DateTime(dt) => RawBsonRef::DateTime(*dt),
            RawBson::Null => RawBsonRef::Null,
            RawBson::RegularExpression(re) => RawBsonRef::RegularExpression(re.as_raw_regex()),
            RawBson::DbPointer(p) => RawBsonRef::DbPointer(p.as_raw_db_pointer()),
            RawBson::JavaScriptCode(code) => RawBsonRef::JavaScriptCode(code),
            RawBson::Symbol(s) => RawBsonRef::Symbol(s),
            RawBson::JavaScriptCodeWithScope(cws) => {
                RawBsonRef::JavaScriptCodeWithScope(RawJavaScriptCodeWithScopeRef {
                    code: &cws.code,
                    scope: &cws.scope,
                })
            }
            RawBson::Int32(i) => RawBsonRef::Int32(*i),
            RawBson::Timestamp(ts) => RawBsonRef::Timestamp(*ts),
            RawBson::Int64(i) => RawBsonRef::Int64(*i),
            RawBson::MaxKey => RawBsonRef::MaxKey,
            RawBson::MinKey => RawBsonRef::MinKey,
        }
    }
}

impl<'a> From<&'a RawBson> for RawBsonRef<'a> {
    fn from(value: &'a RawBson) -> Self {
        value.as_raw_bson_ref()
    }
}

macro_rules! from_owned {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for RawBson {
                fn from(value: $ty) -> Self {
                    RawBson::$variant(value)
                }
            }
        )*
    };
}

from_owned! {
    f64 => Double,
    String => String,
    RawDocumentBuf => Document,
    RawArrayBuf => Array,
    Binary => Binary,
    ObjectId => ObjectId,
    bool => Boolean,
    DateTime => DateTime,
    Regex => RegularExpression,
    DbPointer => DbPointer,
    RawJavaScriptCodeWithScope => JavaScriptCodeWithScope,
    i32 => Int32,
    Timestamp => Timestamp,
    i64 => Int64,
}

impl From<&str> for RawBson {
    fn from(s: &str) -> Self {
        RawBson::String(s.to_owned())
    }
}

/// Owned JavaScript code with its scope document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawJavaScriptCodeWithScope {
    pub code: String,
    pub scope: RawDocumentBuf,
}
