//! respkv CLI Client
//!
//! Command-line interface for interacting with respkv.

use std::net::TcpStream;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use clap::{Parser, Subcommand};
use respkv::protocol::{read_value, write_value, Value};

/// respkv CLI
#[derive(Parser, Debug)]
#[command(name = "respkv-cli")]
#[command(about = "CLI for the respkv key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    /// Give up on a reply after this many milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Echo a message back
    Echo {
        /// The message to echo
        message: Option<String>,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },
}

impl Commands {
    /// Wire request for this subcommand
    fn to_request(&self) -> Value {
        let parts: Vec<Bytes> = match self {
            Commands::Ping => vec![Bytes::from_static(b"ping")],
            Commands::Echo { message } => {
                let mut parts = vec![Bytes::from_static(b"echo")];
                parts.extend(message.clone().map(Bytes::from));
                parts
            }
            Commands::Get { key } => vec![Bytes::from_static(b"get"), Bytes::from(key.clone())],
            Commands::Set { key, value } => vec![
                Bytes::from_static(b"set"),
                Bytes::from(key.clone()),
                Bytes::from(value.clone()),
            ],
        };
        Value::command(parts)
    }
}

fn main() {
    let args = Args::parse();

    match run(&args) {
        Ok(reply) => println!("{}", format_reply(&reply)),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> respkv::Result<Value> {
    let mut stream = TcpStream::connect(&args.server)?;
    if args.timeout_ms > 0 {
        stream.set_read_timeout(Some(Duration::from_millis(args.timeout_ms)))?;
    }

    write_value(&mut stream, &args.command.to_request())?;

    let mut buffer = BytesMut::new();
    read_value(&mut stream, &mut buffer)
}

/// Render a reply the way redis-cli does
fn format_reply(reply: &Value) -> String {
    match reply {
        Value::SimpleString(s) => String::from_utf8_lossy(s).into_owned(),
        Value::Error(e) => format!("(error) {}", String::from_utf8_lossy(e)),
        Value::Integer(n) => format!("(integer) {}", n),
        Value::BulkString(Some(b)) => format!("\"{}\"", String::from_utf8_lossy(b)),
        Value::BulkString(None) | Value::Array(None) => "(nil)".to_string(),
        Value::Array(Some(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}) {}", i + 1, format_reply(item)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
