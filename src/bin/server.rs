//! respkv Server Binary
//!
//! Starts the TCP server for respkv.

use std::sync::Arc;

use clap::Parser;
use respkv::network::Server;
use respkv::{Config, ReplyMode, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// respkv Server
#[derive(Parser, Debug)]
#[command(name = "respkv-server")]
#[command(about = "In-memory key-value store speaking a RESP-style protocol")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:6379")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    /// Write timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    write_timeout_ms: u64,

    /// Number of store shards
    #[arg(short, long, default_value = "16")]
    shards: usize,

    /// Case-insensitive commands, error replies and nil for missing keys
    #[arg(long)]
    strict: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,respkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("respkv Server v{}", respkv::VERSION);

    let reply_mode = if args.strict {
        ReplyMode::Strict
    } else {
        ReplyMode::Compat
    };

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms)
        .store_shards(args.shards)
        .reply_mode(reply_mode)
        .build();

    tracing::info!("Reply mode: {:?}, store shards: {}", reply_mode, config.store_shards);

    let store = Arc::new(Store::with_shards(config.store_shards));

    let server = match Server::bind(config, store) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server on {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    // First Ctrl+C drains connections, a second one exits immediately
    let shutdown = server.shutdown_handle();
    let installed = ctrlc::set_handler(move || {
        if shutdown.is_shutdown() {
            tracing::warn!("Received second Ctrl+C, exiting");
            std::process::exit(130);
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.shutdown();
    });
    if let Err(e) = installed {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
