//! Command definitions
//!
//! Turns a decoded request array into a typed command.

use bytes::Bytes;

use super::Value;
use crate::error::{KvError, Result};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Ping,
    Echo,
    Get,
    Set,
}

impl CommandType {
    const ALL: [CommandType; 4] = [
        CommandType::Ping,
        CommandType::Echo,
        CommandType::Get,
        CommandType::Set,
    ];

    /// Wire name of the command
    pub fn name(self) -> &'static str {
        match self {
            CommandType::Ping => "ping",
            CommandType::Echo => "echo",
            CommandType::Get => "get",
            CommandType::Set => "set",
        }
    }

    /// Minimum number of arguments after the command name
    pub fn min_args(self) -> usize {
        match self {
            CommandType::Ping | CommandType::Echo => 0,
            CommandType::Get => 1,
            CommandType::Set => 2,
        }
    }

    /// Look a command up by name.
    ///
    /// Without `ignore_case` the name must match the lowercase literal exactly.
    pub fn from_name(name: &[u8], ignore_case: bool) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| {
            let literal = ty.name().as_bytes();
            if ignore_case {
                literal.eq_ignore_ascii_case(name)
            } else {
                literal == name
            }
        })
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ping (health check)
    Ping,

    /// Echo a message back
    Echo { message: Option<Bytes> },

    /// Get a value by key
    Get { key: Bytes },

    /// Set a key-value pair
    Set { key: Bytes, value: Bytes },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Ping => CommandType::Ping,
            Command::Echo { .. } => CommandType::Echo,
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
        }
    }

    /// Parse a request value into a command
    ///
    /// The request must be a non-empty array of string values; anything else
    /// is a protocol error. Unknown names and missing arguments come back as
    /// the recoverable `UnknownCommand` and `Arity` errors.
    pub fn parse(request: Value, ignore_case: bool) -> Result<Command> {
        let items = match request {
            Value::Array(Some(items)) if !items.is_empty() => items,
            Value::Array(_) => {
                return Err(KvError::Protocol("no command in request".to_string()));
            }
            other => {
                return Err(KvError::Protocol(format!(
                    "expected a command array, got {:?}",
                    other.tag() as char
                )));
            }
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in &items {
            let bytes = item.as_bytes().ok_or_else(|| {
                KvError::Protocol(format!(
                    "command parts must be strings, got {:?}",
                    item.tag() as char
                ))
            })?;
            parts.push(bytes);
        }

        let name = parts.remove(0);
        let args = parts;

        let command_type = CommandType::from_name(&name, ignore_case).ok_or_else(|| {
            KvError::UnknownCommand(String::from_utf8_lossy(&name).into_owned())
        })?;

        if args.len() < command_type.min_args() {
            return Err(KvError::Arity {
                command: command_type.name(),
                expected: command_type.min_args(),
                got: args.len(),
            });
        }

        let mut args = args.into_iter();
        let command = match command_type {
            CommandType::Ping => Command::Ping,
            CommandType::Echo => Command::Echo {
                message: args.next(),
            },
            CommandType::Get => Command::Get {
                key: args.next().unwrap_or_default(),
            },
            CommandType::Set => {
                let key = args.next().unwrap_or_default();
                let value = args.next().unwrap_or_default();
                Command::Set { key, value }
            }
        };

        Ok(command)
    }
}
