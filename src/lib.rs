//! # respkv
//!
//! An in-memory key-value store speaking a RESP-style wire protocol:
//! - Streaming protocol codec (partial frames are reassembled across reads)
//! - Sharded, lock-protected store shared by all connections
//! - One worker thread per TCP connection
//! - PING, ECHO, GET and SET commands
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one thread per connection)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ bytes
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Protocol Codec                             │
//! │             (decode request / encode reply)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Value
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Dispatcher                                │
//! │                (ping / echo / get / set)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!              ┌─────────────────┐
//!              │      Store      │
//!              │ (RwLock shards) │
//!              └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod store;
pub mod dispatcher;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DecodeError, KvError, Result};
pub use config::{Config, ReplyMode};
pub use dispatcher::Dispatcher;
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of respkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
