//! Configuration for respkv
//!
//! Centralized configuration with sensible defaults.

use crate::error::{KvError, Result};

/// How the dispatcher reports logical failures and missing keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    /// Classic wire behaviour: case-sensitive command names,
    /// no reply for bad arity or unknown commands, empty bulk string for a
    /// missing key.
    #[default]
    Compat,

    /// Case-insensitive command names, `-ERR` replies for bad arity and unknown
    /// commands, null bulk string for a missing key.
    Strict,
}

/// Main configuration for a respkv server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Bytes pulled from the socket per read
    pub read_chunk_size: usize,

    /// Upper bound on buffered, not yet decoded bytes per connection
    pub max_frame_size: usize,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Number of independently locked store shards
    pub store_shards: usize,

    // -------------------------------------------------------------------------
    // Dispatch Configuration
    // -------------------------------------------------------------------------
    pub reply_mode: ReplyMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:6379".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            read_chunk_size: 1024,
            max_frame_size: 16 * 1024 * 1024, // 16 MB
            store_shards: 16,
            reply_mode: ReplyMode::Compat,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the values can run a server
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(KvError::Config("listen address is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(KvError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(KvError::Config(
                "read_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.max_frame_size < self.read_chunk_size {
            return Err(KvError::Config(format!(
                "max_frame_size ({}) is smaller than read_chunk_size ({})",
                self.max_frame_size, self.read_chunk_size
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set how many bytes each socket read pulls
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set the per-connection buffered frame limit (in bytes)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the number of store shards
    pub fn store_shards(mut self, shards: usize) -> Self {
        self.config.store_shards = shards;
        self
    }

    pub fn reply_mode(mut self, mode: ReplyMode) -> Self {
        self.config.reply_mode = mode;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
