//! Dispatcher Module
//!
//! Maps a decoded request to a store operation and a reply.
//!
//! ## Responsibilities
//! - Parse request arrays into commands
//! - Execute commands against the shared Store
//! - Decide what, if anything, goes back to the client

use std::sync::Arc;

use bytes::Bytes;

use crate::config::ReplyMode;
use crate::error::{KvError, Result};
use crate::protocol::{Command, Value};
use crate::store::Store;

/// Routes requests to the store
///
/// Cheap to clone; every connection holds its own handle to the same store.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<Store>,
    mode: ReplyMode,
}

impl Dispatcher {
    pub fn new(store: Arc<Store>, mode: ReplyMode) -> Self {
        Self { store, mode }
    }

    /// Execute one request
    ///
    /// Returns the reply to send. `UnknownCommand` and `Arity` errors are
    /// recoverable; use [`Dispatcher::reply_for_error`] to find out whether
    /// the client should hear about them.
    pub fn dispatch(&self, request: Value) -> Result<Value> {
        let command = Command::parse(request, self.mode == ReplyMode::Strict)?;
        tracing::trace!("Executing {:?}", command);
        Ok(self.execute(command))
    }

    /// Execute a parsed command and build its reply
    pub fn execute(&self, command: Command) -> Value {
        match command {
            Command::Ping => Value::simple("PONG"),
            Command::Echo { message } => Value::bulk(message.unwrap_or_default()),
            Command::Get { key } => match self.store.get(&key) {
                Some(value) => Value::bulk(value),
                None => {
                    tracing::trace!("Key not found: {:?}", String::from_utf8_lossy(&key));
                    match self.mode {
                        ReplyMode::Compat => Value::bulk(Bytes::new()),
                        ReplyMode::Strict => Value::null_bulk(),
                    }
                }
            },
            Command::Set { key, value } => {
                self.store.set(key, value);
                Value::simple("OK")
            }
        }
    }

    /// Reply owed to the client for a recoverable dispatch error
    ///
    /// Compat mode stays silent; strict mode answers with an Error value.
    pub fn reply_for_error(&self, error: &KvError) -> Option<Value> {
        match self.mode {
            ReplyMode::Compat => None,
            ReplyMode::Strict => Some(Value::error(error.reply_message())),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}
