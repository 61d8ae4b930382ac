///! @see: [Action Message Format -- AMF 0](https://rtmp.veriskope.com/pdf/amf0-file-format-specification.pdf)
use core::time;
use std::io::{self};

mod reader;
mod writer;

use crate::errors::AmfResult;

pub use self::reader::Reader;
pub use self::writer::Writer;

/// @see: 2.1 Types Overview
pub mod amf0_marker {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const MOVIECLIP: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const REFERENCE: u8 = 0x07;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
    pub const UNSUPPORTED: u8 = 0x0D;
    pub const RECORDSET: u8 = 0x0E;
    pub const XML_DOCUMENT: u8 = 0x0F;
    pub const TYPED_OBJECT: u8 = 0x10;
    pub const AVMPLUS_OBJECT: u8 = 0x11;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// @see: 2.2 Number Type
    Number(f64),
    /// @see: 2.3 Boolean Type
    Boolean(bool),
    /// @see: 2.4 String Type, 2.14 Long String Type
    ///
    /// Long strings collapse into this on read, the writer picks the
    /// encoding by byte length.
    String(String),
    /// @see: 2.5 Object Type, 2.18 Typed Object Type
    Object {
        name: Option<String>,
        entries: Vec<(String, Value)>,
    },
    /// @see: 2.7 null Type
    Null,
    /// @see: 2.8 undefined Type
    Undefined,
    /// @see: 2.9 Reference Type
    Reference { index: u16 },
    /// @see: 2.10 ECMA Array Type
    ECMAArray(Vec<(String, Value)>),
    /// @see: 2.11 Object End Type
    ObjectEnd,
    /// @see: 2.12 Strict Array Type
    StrictArray(Vec<Value>),
    /// @see: 2.13 Date Type
    Date {
        time_zone: i16,
        millis_timestamp: time::Duration,
    },
    /// @see: 2.17 XML Document Type
    XMLDocument(String),
}

impl Value {
    pub fn read_from<R>(reader: R) -> AmfResult<Option<Self>>
    where
        R: io::Read,
    {
        Reader::new(reader).read()
    }

    pub fn read_all<R>(reader: R) -> AmfResult<Vec<Self>>
    where
        R: io::Read,
    {
        Reader::new(reader).read_all()
    }

    pub fn try_as_str(&self) -> Option<&str> {
        match *self {
            Value::String(ref str) => Some(str),
            Value::XMLDocument(ref str) => Some(str),
            _ => None,
        }
    }

    pub fn try_as_f64(&self) -> Option<f64> {
        match *self {
            Value::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_into_values(self) -> Result<Box<dyn Iterator<Item = Value>>, Self> {
        match self {
            Value::StrictArray(values) => Ok(Box::new(values.into_iter())),
            _ => Err(self),
        }
    }

    pub fn try_into_pairs(self) -> Result<Box<dyn Iterator<Item = (String, Value)>>, Self> {
        match self {
            Value::Object { entries, .. } => Ok(Box::new(entries.into_iter())),
            Value::ECMAArray(entries) => Ok(Box::new(entries.into_iter())),
            _ => Err(self),
        }
    }
}

/// Makes a `String` value.
pub fn string<T>(t: T) -> Value
where
    String: From<T>,
{
    Value::String(From::from(t))
}

/// Makes a `Number` value.
pub fn number<T>(t: T) -> Value
where
    f64: From<T>,
{
    Value::Number(From::from(t))
}

/// Makes a `Bool` value.
pub fn bool<T>(t: T) -> Value
where
    bool: From<T>,
{
    Value::Boolean(From::from(t))
}

/// Makes a `Null` value.
pub fn null() -> Value {
    Value::Null
}

/// Makes an anonymous `Object` value.
pub fn object<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    String: From<K>,
{
    Value::Object {
        name: None,
        entries: entries.into_iter().map(|(k, v)| (From::from(k), v)).collect(),
    }
}
