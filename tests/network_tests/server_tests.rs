//! Server Tests
//!
//! Real TCP connections against a server bound to an ephemeral port.
//!
//! Tests verify:
//! - Request framing across reads (split and pipelined requests)
//! - Error handling at the connection level
//! - Connection limits and graceful shutdown

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use respkv::network::{Server, ShutdownHandle};
use respkv::{Config, ReplyMode, Store};

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<respkv::Result<()>>>,
}

impl TestServer {
    fn start(config: Config) -> Self {
        let server = Server::bind(config, Arc::new(Store::new())).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            shutdown,
            thread: Some(thread),
        }
    }

    fn start_default() -> Self {
        Self::start(Config::builder().listen_addr("127.0.0.1:0").build())
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_nodelay(true).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    fn stop(mut self) -> respkv::Result<()> {
        self.shutdown.shutdown();
        self.thread.take().unwrap().join().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shutdown.shutdown();
            let _ = thread.join();
        }
    }
}

fn send(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).unwrap();
}

fn read_exact(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).unwrap();
    buf
}

fn request(stream: &mut TcpStream, bytes: &[u8], expected: &[u8]) {
    send(stream, bytes);
    assert_eq!(read_exact(stream, expected.len()), expected);
}

/// The server closed the connection without sending anything else
fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    match stream.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("Expected close, got {:?}", String::from_utf8_lossy(&buf[..n])),
        Err(e) if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted) => {}
        Err(e) => panic!("Expected close, got error {}", e),
    }
}

const PING: &[u8] = b"*1\r\n$4\r\nping\r\n";
const PONG: &[u8] = b"+PONG\r\n";

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_request_split_across_writes() {
    let server = TestServer::start_default();
    let mut client = server.connect();

    let frame = b"*2\r\n$4\r\necho\r\n$5\r\nhello\r\n";
    for byte in frame.iter() {
        send(&mut client, &[*byte]);
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(read_exact(&mut client, 11), b"$5\r\nhello\r\n");

    // Exactly one reply: the next request gets its own answer
    request(&mut client, PING, PONG);
}

#[test]
fn test_pipelined_requests_in_one_write() {
    let server = TestServer::start_default();
    let mut client = server.connect();

    send(
        &mut client,
        b"*3\r\n$3\r\nset\r\n$1\r\na\r\n$1\r\n1\r\n*2\r\n$3\r\nget\r\n$1\r\na\r\n*1\r\n$4\r\nping\r\n",
    );

    assert_eq!(read_exact(&mut client, 5 + 7 + 7), b"+OK\r\n$1\r\n1\r\n+PONG\r\n");
}

#[test]
fn test_value_larger_than_read_chunk() {
    let server = TestServer::start(
        Config::builder()
            .listen_addr("127.0.0.1:0")
            .read_chunk_size(64)
            .build(),
    );
    let mut client = server.connect();

    let value = vec![b'x'; 10_000];
    let mut set = format!("*3\r\n$3\r\nset\r\n$3\r\nbig\r\n${}\r\n", value.len()).into_bytes();
    set.extend_from_slice(&value);
    set.extend_from_slice(b"\r\n");
    request(&mut client, &set, b"+OK\r\n");

    send(&mut client, b"*2\r\n$3\r\nget\r\n$3\r\nbig\r\n");
    let mut expected = b"$10000\r\n".to_vec();
    expected.extend_from_slice(&value);
    expected.extend_from_slice(b"\r\n");
    assert_eq!(read_exact(&mut client, expected.len()), expected);
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_malformed_frame_closes_connection() {
    let server = TestServer::start_default();
    let mut client = server.connect();

    request(&mut client, PING, PONG);
    send(&mut client, b"*1\r\n$4\nping\r\n");
    assert_closed(&mut client);

    // The server itself keeps serving
    let mut other = server.connect();
    request(&mut other, PING, PONG);
}

#[test]
fn test_replies_before_malformed_frame_are_delivered() {
    let server = TestServer::start_default();
    let mut client = server.connect();

    let mut bytes = PING.to_vec();
    bytes.extend_from_slice(b"*1\r\n$4\nping\r\n");
    send(&mut client, &bytes);

    assert_eq!(read_exact(&mut client, PONG.len()), PONG);
    assert_closed(&mut client);
}

#[test]
fn test_unsupported_type_closes_connection() {
    let server = TestServer::start_default();
    let mut client = server.connect();

    send(&mut client, b"!1\r\n");
    assert_closed(&mut client);
}

#[test]
fn test_arity_error_sends_nothing_in_compat_mode() {
    let server = TestServer::start_default();
    let mut client = server.connect();

    send(&mut client, b"*1\r\n$3\r\nget\r\n");
    send(&mut client, b"*2\r\n$3\r\nset\r\n$1\r\nk\r\n");
    send(&mut client, b"*1\r\n$7\r\nunknown\r\n");

    // Only the ping is answered and the connection is still usable
    request(&mut client, PING, PONG);
}

#[test]
fn test_arity_error_reply_in_strict_mode() {
    let server = TestServer::start(
        Config::builder()
            .listen_addr("127.0.0.1:0")
            .reply_mode(ReplyMode::Strict)
            .build(),
    );
    let mut client = server.connect();

    let expected = b"-ERR wrong number of arguments for 'get' command\r\n";
    request(&mut client, b"*1\r\n$3\r\nGET\r\n", expected);

    let expected = b"-ERR unknown command 'nope'\r\n";
    request(&mut client, b"*1\r\n$4\r\nnope\r\n", expected);

    request(&mut client, b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n", b"$-1\r\n");
}

#[test]
fn test_frame_limit_closes_connection() {
    let server = TestServer::start(
        Config::builder()
            .listen_addr("127.0.0.1:0")
            .read_chunk_size(64)
            .max_frame_size(128)
            .build(),
    );
    let mut client = server.connect();

    let mut frame = b"*3\r\n$3\r\nset\r\n$1\r\nk\r\n$1000\r\n".to_vec();
    frame.extend_from_slice(&[b'y'; 1000]);
    frame.extend_from_slice(b"\r\n");

    // The server may close before the whole frame is written
    let _ = client.write_all(&frame);
    assert_closed(&mut client);
}

// =============================================================================
// Concurrency / Lifecycle Tests
// =============================================================================

#[test]
fn test_concurrent_clients_share_store() {
    let server = TestServer::start_default();
    let mut handles = vec![];

    for t in 0..8 {
        let mut client = server.connect();
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                let key = format!("c{}-k{}", t, i);
                let frame = format!("*3\r\n$3\r\nset\r\n${}\r\n{}\r\n$1\r\nv\r\n", key.len(), key);
                request(&mut client, frame.as_bytes(), b"+OK\r\n");
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let mut reader = server.connect();
    for t in 0..8 {
        for i in 0..50 {
            let key = format!("c{}-k{}", t, i);
            let frame = format!("*2\r\n$3\r\nget\r\n${}\r\n{}\r\n", key.len(), key);
            request(&mut reader, frame.as_bytes(), b"$1\r\nv\r\n");
        }
    }
}

#[test]
fn test_connection_limit() {
    let server = TestServer::start(
        Config::builder()
            .listen_addr("127.0.0.1:0")
            .max_connections(1)
            .build(),
    );

    let mut first = server.connect();
    request(&mut first, PING, PONG);

    let mut second = server.connect();
    assert_closed(&mut second);

    // The admitted connection is unaffected
    request(&mut first, PING, PONG);
}

#[test]
fn test_shutdown_closes_idle_connections() {
    let server = TestServer::start_default();
    let mut client = server.connect();
    request(&mut client, PING, PONG);

    server.stop().unwrap();

    assert_closed(&mut client);
}

#[test]
fn test_shutdown_handle_reports_state() {
    let server = TestServer::start_default();
    let handle = server.shutdown.clone();
    assert!(!handle.is_shutdown());

    server.stop().unwrap();
    assert!(handle.is_shutdown());
}

#[test]
fn test_bind_rejects_invalid_config() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .read_chunk_size(0)
        .build();
    assert!(Server::bind(config, Arc::new(Store::new())).is_err());
}
