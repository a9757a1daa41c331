//! Error types for respkv
//!
//! Provides the codec error type and a unified error type for everything above it.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Errors produced while decoding a protocol value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// There are no bytes at all to decode
    #[error("empty stream: no request to decode")]
    EmptyStream,

    /// A value has started but not all of its bytes have arrived yet
    #[error("incomplete frame")]
    Incomplete,

    /// A line was not terminated by CRLF
    #[error("framing error: line not terminated by CRLF")]
    Framing,

    /// A length field was not a valid length
    #[error("malformed length: {0:?}")]
    MalformedLength(String),

    /// An integer value could not be parsed
    #[error("malformed integer: {0:?}")]
    MalformedInteger(String),

    /// The leading type tag is not part of the protocol
    #[error("unsupported type tag: {0:#04x}")]
    UnsupportedType(u8),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("nesting too deep (max {0} levels)")]
    NestingTooDeep(usize),
}

impl DecodeError {
    /// Whether more bytes could turn this failure into a success
    pub fn needs_more_data(&self) -> bool {
        matches!(self, DecodeError::EmptyStream | DecodeError::Incomplete)
    }
}

/// Unified error type for respkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("wrong number of arguments for '{command}' command: expected at least {expected}, got {got}")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Recoverable errors are reported and the connection keeps going.
    /// Everything else ends the connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KvError::Arity { .. } | KvError::UnknownCommand(_))
    }

    /// Message sent to the client in an Error reply
    pub fn reply_message(&self) -> String {
        match self {
            KvError::Arity { command, .. } => {
                format!("ERR wrong number of arguments for '{}' command", command)
            }
            KvError::UnknownCommand(name) => format!("ERR unknown command '{}'", name),
            other => format!("ERR {}", other),
        }
    }
}
