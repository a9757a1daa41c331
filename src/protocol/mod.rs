//! Protocol Module
//!
//! Defines the RESP-style wire protocol for client-server communication.
//!
//! ## Request Format
//! ```text
//! *3\r\n
//! $3\r\nset\r\n
//! $3\r\nfoo\r\n
//! $3\r\nbar\r\n
//! ```
//! A request is an array whose first item is the command name and whose
//! remaining items are the arguments, each a bulk string of raw bytes.
//!
//! ### Commands
//! - `ping`             -> `+PONG`
//! - `echo [message]`   -> bulk string
//! - `get key`          -> bulk string
//! - `set key value`    -> `+OK`

mod command;
mod value;
pub mod codec;

pub use command::{Command, CommandType};
pub use value::Value;
pub use codec::{decode, encode, encode_into, read_value, write_value, Decoder};
