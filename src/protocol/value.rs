//! Protocol value definitions
//!
//! The typed form of everything that travels over the wire.

use bytes::Bytes;

/// Type tag bytes
pub const SIMPLE_STRING_TAG: u8 = b'+';
pub const ERROR_TAG: u8 = b'-';
pub const INTEGER_TAG: u8 = b':';
pub const BULK_STRING_TAG: u8 = b'$';
pub const ARRAY_TAG: u8 = b'*';

/// A single protocol value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `+OK\r\n`. Content must not contain CR or LF.
    SimpleString(Bytes),

    /// `-ERR message\r\n`. Content must not contain CR or LF.
    Error(Bytes),

    /// `:1000\r\n`
    Integer(i64),

    /// `$5\r\nhello\r\n`, or `$-1\r\n` for the null bulk string
    BulkString(Option<Bytes>),

    /// `*2\r\n...`, or `*-1\r\n` for the null array
    Array(Option<Vec<Value>>),
}

impl Value {
    /// Create a simple string value
    pub fn simple(content: impl Into<Bytes>) -> Self {
        Value::SimpleString(content.into())
    }

    /// Create an error value
    pub fn error(message: impl Into<Bytes>) -> Self {
        Value::Error(message.into())
    }

    /// Create a (non-null) bulk string value
    pub fn bulk(content: impl Into<Bytes>) -> Self {
        Value::BulkString(Some(content.into()))
    }

    /// Create the null bulk string
    pub fn null_bulk() -> Self {
        Value::BulkString(None)
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Some(items))
    }

    /// Build a command request: an array of bulk strings
    pub fn command<I, B>(parts: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Value::Array(Some(parts.into_iter().map(Value::bulk).collect()))
    }

    /// Raw bytes carried by a string-like value.
    ///
    /// The null bulk string yields empty bytes; integers and arrays yield `None`.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            Value::SimpleString(b) | Value::Error(b) => Some(b.clone()),
            Value::BulkString(Some(b)) => Some(b.clone()),
            Value::BulkString(None) => Some(Bytes::new()),
            Value::Integer(_) | Value::Array(_) => None,
        }
    }

    /// The wire tag for this value
    pub fn tag(&self) -> u8 {
        match self {
            Value::SimpleString(_) => SIMPLE_STRING_TAG,
            Value::Error(_) => ERROR_TAG,
            Value::Integer(_) => INTEGER_TAG,
            Value::BulkString(_) => BULK_STRING_TAG,
            Value::Array(_) => ARRAY_TAG,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::BulkString(None) | Value::Array(None))
    }
}
