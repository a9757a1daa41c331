//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls for shutdown)
//! - One worker thread per connection
//! - Requests routed through the Dispatcher

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::Connection;
