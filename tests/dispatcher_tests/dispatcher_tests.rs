//! Tests for Dispatcher
//!
//! These tests verify:
//! - Replies for ping / echo / get / set
//! - Compat vs strict reply modes
//! - Recoverable vs terminal dispatch errors

use std::sync::Arc;

use bytes::Bytes;
use respkv::protocol::{decode, encode, Value};
use respkv::{Dispatcher, KvError, ReplyMode, Store};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup(mode: ReplyMode) -> Dispatcher {
    Dispatcher::new(Arc::new(Store::new()), mode)
}

/// Run raw request bytes through decode -> dispatch -> encode
fn roundtrip(dispatcher: &Dispatcher, request: &[u8]) -> Vec<u8> {
    let (value, _) = decode(request).unwrap();
    let reply = dispatcher.dispatch(value).unwrap();
    encode(&reply).to_vec()
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_ping() {
    let dispatcher = setup(ReplyMode::Compat);
    assert_eq!(roundtrip(&dispatcher, b"*1\r\n$4\r\nping\r\n"), b"+PONG\r\n");
}

#[test]
fn test_echo() {
    let dispatcher = setup(ReplyMode::Compat);
    assert_eq!(
        roundtrip(&dispatcher, b"*2\r\n$4\r\necho\r\n$5\r\nhello\r\n"),
        b"$5\r\nhello\r\n"
    );
}

#[test]
fn test_echo_without_argument_is_empty() {
    let dispatcher = setup(ReplyMode::Compat);
    assert_eq!(roundtrip(&dispatcher, b"*1\r\n$4\r\necho\r\n"), b"$0\r\n\r\n");
}

#[test]
fn test_set_then_get() {
    let dispatcher = setup(ReplyMode::Compat);

    assert_eq!(
        roundtrip(&dispatcher, b"*3\r\n$3\r\nset\r\n$3\r\nfoo\r\n$3\r\nbar\r\n"),
        b"+OK\r\n"
    );
    assert_eq!(
        roundtrip(&dispatcher, b"*2\r\n$3\r\nget\r\n$3\r\nfoo\r\n"),
        b"$3\r\nbar\r\n"
    );
}

#[test]
fn test_last_write_wins() {
    let dispatcher = setup(ReplyMode::Compat);

    dispatcher.dispatch(Value::command(["set", "k", "v1"])).unwrap();
    dispatcher.dispatch(Value::command(["set", "k", "v2"])).unwrap();

    assert_eq!(
        dispatcher.dispatch(Value::command(["get", "k"])).unwrap(),
        Value::bulk("v2")
    );
}

#[test]
fn test_get_missing_compat_is_empty_bulk() {
    let dispatcher = setup(ReplyMode::Compat);
    assert_eq!(
        roundtrip(&dispatcher, b"*2\r\n$3\r\nget\r\n$7\r\nmissing\r\n"),
        b"$0\r\n\r\n"
    );
}

#[test]
fn test_get_missing_strict_is_null() {
    let dispatcher = setup(ReplyMode::Strict);
    assert_eq!(
        roundtrip(&dispatcher, b"*2\r\n$3\r\nget\r\n$7\r\nmissing\r\n"),
        b"$-1\r\n"
    );
}

#[test]
fn test_set_writes_through_to_store() {
    let dispatcher = setup(ReplyMode::Compat);

    dispatcher
        .dispatch(Value::command(["set", "user", "ada"]))
        .unwrap();

    assert_eq!(dispatcher.store().get(b"user"), Some(Bytes::from_static(b"ada")));
    assert_eq!(dispatcher.store().len(), 1);
}

#[test]
fn test_simple_string_parts_are_accepted() {
    let dispatcher = setup(ReplyMode::Compat);
    let request = Value::array(vec![Value::simple("echo"), Value::simple("hi")]);
    assert_eq!(dispatcher.dispatch(request).unwrap(), Value::bulk("hi"));
}

// =============================================================================
// Case Sensitivity Tests
// =============================================================================

#[test]
fn test_uppercase_is_unknown_in_compat_mode() {
    let dispatcher = setup(ReplyMode::Compat);
    let err = dispatcher.dispatch(Value::command(["PING"])).unwrap_err();

    assert!(matches!(err, KvError::UnknownCommand(ref name) if name == "PING"));
    assert!(err.is_recoverable());
    assert_eq!(dispatcher.reply_for_error(&err), None);
}

#[test]
fn test_uppercase_is_accepted_in_strict_mode() {
    let dispatcher = setup(ReplyMode::Strict);
    assert_eq!(
        dispatcher.dispatch(Value::command(["PING"])).unwrap(),
        Value::simple("PONG")
    );
    assert_eq!(
        dispatcher.dispatch(Value::command(["SET", "a", "1"])).unwrap(),
        Value::simple("OK")
    );
    assert_eq!(
        dispatcher.dispatch(Value::command(["Get", "a"])).unwrap(),
        Value::bulk("1")
    );
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_arity_errors_are_recoverable() {
    let dispatcher = setup(ReplyMode::Compat);

    for request in [Value::command(["get"]), Value::command(["set", "only-key"])] {
        let err = dispatcher.dispatch(request).unwrap_err();
        assert!(matches!(err, KvError::Arity { .. }));
        assert!(err.is_recoverable());
        assert_eq!(dispatcher.reply_for_error(&err), None);
    }

    // Nothing was written
    assert!(dispatcher.store().is_empty());
}

#[test]
fn test_strict_mode_error_replies() {
    let dispatcher = setup(ReplyMode::Strict);

    let err = dispatcher.dispatch(Value::command(["get"])).unwrap_err();
    let reply = dispatcher.reply_for_error(&err).unwrap();
    assert_eq!(
        &encode(&reply)[..],
        b"-ERR wrong number of arguments for 'get' command\r\n"
    );

    let err = dispatcher.dispatch(Value::command(["flushall"])).unwrap_err();
    let reply = dispatcher.reply_for_error(&err).unwrap();
    assert_eq!(&encode(&reply)[..], b"-ERR unknown command 'flushall'\r\n");
}

#[test]
fn test_non_command_requests_are_terminal() {
    let dispatcher = setup(ReplyMode::Compat);

    let requests = [
        Value::simple("ping"),
        Value::array(vec![]),
        Value::Array(None),
        Value::array(vec![Value::Integer(1)]),
        Value::array(vec![Value::bulk("echo"), Value::array(vec![])]),
    ];

    for request in requests {
        let err = dispatcher.dispatch(request).unwrap_err();
        assert!(matches!(err, KvError::Protocol(_)), "got {:?}", err);
        assert!(!err.is_recoverable());
    }
}
