//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufWriter, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use bytes::BytesMut;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{DecodeError, KvError, Result};
use crate::protocol::{encode, Decoder, Value};

/// Handles a single client connection
///
/// Bytes are read in bounded chunks and appended to a growable buffer. Every
/// complete request in the buffer is answered in order; a partial request
/// stays buffered until the rest arrives.
pub struct Connection {
    /// TCP stream reader (raw; framing is done on `buffer`)
    reader: TcpStream,

    /// TCP stream writer (buffered; flushed once per read)
    writer: BufWriter<TcpStream>,

    /// Bytes received but not yet decoded
    buffer: BytesMut,

    /// Remembers how much of `buffer` is already validated
    decoder: Decoder,

    /// Scratch space for a single socket read
    chunk: Vec<u8>,

    /// Limit on `buffer` before the connection is dropped
    max_frame_size: usize,

    /// Shared command dispatcher
    dispatcher: Dispatcher,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and configures timeouts
    pub fn new(stream: TcpStream, dispatcher: Dispatcher, config: &Config) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        let mut connection = Self {
            reader: read_stream,
            writer: BufWriter::new(write_stream),
            buffer: BytesMut::with_capacity(config.read_chunk_size),
            decoder: Decoder::new(),
            chunk: vec![0u8; config.read_chunk_size],
            max_frame_size: config.max_frame_size,
            dispatcher,
            peer_addr,
        };
        connection.set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;

        Ok(connection)
    }

    /// Configure connection timeouts (0 leaves a direction without timeout)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_timeout = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        let write_timeout = (write_ms > 0).then(|| Duration::from_millis(write_ms));

        self.reader.set_read_timeout(read_timeout)?;
        self.writer.get_ref().set_write_timeout(write_timeout)?;

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends replies.
    /// Returns when the client disconnects or an unrecoverable error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let n = match self.read_chunk() {
                Ok(n) => n,
                Err(e) if is_disconnect(&e) => {
                    tracing::debug!("Connection to {} ended: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            };

            if n == 0 {
                if self.buffer.is_empty() {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                } else {
                    tracing::debug!(
                        "Client {} disconnected with {} undecoded bytes",
                        self.peer_addr,
                        self.buffer.len()
                    );
                }
                return Ok(());
            }

            tracing::trace!("Read {} bytes from {}", n, self.peer_addr);

            let result = self
                .process_buffer()
                .and_then(|()| self.writer.flush().map_err(KvError::from));
            match result {
                Ok(()) => {}
                Err(KvError::Io(ref e)) if is_disconnect(e) => {
                    // The client went away before we could answer
                    tracing::debug!(
                        "Client {} disconnected before reply could be sent: {}",
                        self.peer_addr,
                        e
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Closing connection to {}: {}", self.peer_addr, e);
                    // Replies queued before the failure still go out
                    if let Err(flush_err) = self.writer.flush() {
                        tracing::debug!(
                            "Final flush to {} failed: {}",
                            self.peer_addr,
                            flush_err
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Decode and answer every complete request in the buffer
    fn process_buffer(&mut self) -> Result<()> {
        while let Some(request) = self.decoder.decode(&mut self.buffer)? {
            tracing::trace!("Received request from {}: {:?}", self.peer_addr, request);

            match self.dispatcher.dispatch(request) {
                Ok(reply) => self.send_reply(&reply)?,
                Err(e) if e.is_recoverable() => {
                    match &e {
                        KvError::UnknownCommand(_) => {
                            tracing::debug!("Ignoring request from {}: {}", self.peer_addr, e)
                        }
                        _ => tracing::warn!("Rejected request from {}: {}", self.peer_addr, e),
                    }
                    if let Some(reply) = self.dispatcher.reply_for_error(&e) {
                        self.send_reply(&reply)?;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if self.buffer.len() > self.max_frame_size {
            return Err(DecodeError::FrameTooLarge {
                size: self.buffer.len(),
                max: self.max_frame_size,
            }
            .into());
        }

        Ok(())
    }

    /// Pull one chunk from the socket into the buffer
    fn read_chunk(&mut self) -> io::Result<usize> {
        loop {
            match self.reader.read(&mut self.chunk) {
                Ok(n) => {
                    self.buffer.extend_from_slice(&self.chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Queue a reply on the buffered writer
    fn send_reply(&mut self, reply: &Value) -> Result<()> {
        self.writer.write_all(&encode(reply))?;
        Ok(())
    }
}

/// Errors that mean the peer is gone (or went quiet past the timeout)
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            // Read timeouts surface as WouldBlock on Unix, TimedOut on Windows
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
