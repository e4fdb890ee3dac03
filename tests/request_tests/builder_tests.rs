//! Tests for RequestBuilder
//!
//! These tests verify:
//! - Namespace validation of keys, values and buffers
//! - Building requests from wire commands
//! - Request pool exhaustion and slot release
//! - Completion delivery (channel and callback sinks, drop)

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use nvmkv::config::Namespace;
use nvmkv::dispatch::Output;
use nvmkv::protocol::{KvCommand, Opcode, RetrieveOptions, Status, StoreOptions};
use nvmkv::request::{CompletionSink, RequestBuilder, RequestPool};
use nvmkv::{Key, KvError};

// =============================================================================
// Helper Functions
// =============================================================================

fn key(bytes: &[u8]) -> Key {
    Key::new(bytes).unwrap()
}

fn builder(pool: usize) -> RequestBuilder {
    let namespace = Namespace {
        id: 3,
        max_key_len: 8,
        max_value_len: 64,
        max_num_keys: 0,
    };
    RequestBuilder::new(namespace, RequestPool::new(pool))
}

fn sink() -> CompletionSink {
    CompletionSink::from_fn(|_| {})
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_store_request_fields() {
    let b = builder(4);
    let request = b
        .store(7, &key(b"AB"), &b"value"[..], StoreOptions::no_overwrite(), sink())
        .unwrap();

    assert_eq!(request.cid(), 7);
    assert_eq!(request.opcode(), Opcode::Store);
    assert_eq!(request.nsid(), 3);
    assert_eq!(request.key(), &key(b"AB"));
    assert_eq!(request.value().unwrap(), &Bytes::from_static(b"value"));
    assert!(request.store_options().no_overwrite);
}

#[test]
fn test_key_size_limits() {
    let b = builder(4);
    assert!(matches!(
        b.delete(1, &key(b""), sink()),
        Err(KvError::InvalidKeySize(0))
    ));
    assert!(matches!(
        b.exist(1, &key(b"123456789"), sink()),
        Err(KvError::InvalidKeySize(9))
    ));
    assert!(b.exist(1, &key(b"12345678"), sink()).is_ok());
}

#[test]
fn test_value_size_limits() {
    let b = builder(4);
    assert!(matches!(
        b.store(1, &key(b"k"), vec![0u8; 65], StoreOptions::default(), sink()),
        Err(KvError::InvalidValueSize(65))
    ));
    assert!(matches!(
        b.retrieve(1, &key(b"k"), 65, RetrieveOptions::default(), sink()),
        Err(KvError::InvalidValueSize(65))
    ));
    assert!(b
        .store(1, &key(b"k"), vec![0u8; 64], StoreOptions::default(), sink())
        .is_ok());
}

#[test]
fn test_list_buffer_must_hold_count() {
    let b = builder(4);
    assert!(matches!(
        b.list(1, &Key::MIN, 3, sink()),
        Err(KvError::InvalidField(_))
    ));
    assert_eq!(b.list(1, &Key::MIN, 4, sink()).unwrap().buffer_len(), 4);
}

// =============================================================================
// Wire Command Tests
// =============================================================================

#[test]
fn test_from_command_store() {
    let b = builder(4);
    let cmd = KvCommand::store(11, 3, &key(b"AB"), 3, StoreOptions::overwrite_only());
    let request = b
        .from_command(&cmd, Bytes::from_static(b"xyz"), sink())
        .unwrap();

    assert_eq!(request.cid(), 11);
    assert_eq!(request.key(), &key(b"AB"));
    assert!(request.store_options().overwrite_only);
    assert_eq!(request.value().unwrap().as_ref(), b"xyz");
}

#[test]
fn test_from_command_payload_mismatch() {
    let b = builder(4);
    let cmd = KvCommand::store(1, 3, &key(b"AB"), 4, StoreOptions::default());
    assert!(matches!(
        b.from_command(&cmd, Bytes::from_static(b"xyz"), sink()),
        Err(KvError::InvalidField(_))
    ));
}

#[test]
fn test_from_command_rejects_fused_and_wrong_namespace() {
    let b = builder(4);

    let mut fused = KvCommand::exist(1, 3, &key(b"k"));
    fused.fuse = 1;
    assert!(matches!(
        b.from_command(&fused, Bytes::new(), sink()),
        Err(KvError::InvalidField(_))
    ));

    let other_ns = KvCommand::exist(1, 4, &key(b"k"));
    assert!(matches!(
        b.from_command(&other_ns, Bytes::new(), sink()),
        Err(KvError::InvalidField(_))
    ));
}

#[test]
fn test_from_command_retrieve_and_list() {
    let b = builder(4);

    let cmd = KvCommand::retrieve(2, 3, &key(b"k"), 32, RetrieveOptions { raw_data: true });
    let request = b.from_command(&cmd, Bytes::new(), sink()).unwrap();
    assert_eq!(request.opcode(), Opcode::Retrieve);
    assert_eq!(request.buffer_len(), 32);
    assert!(request.retrieve_options().raw_data);

    let cmd = KvCommand::list(3, 3, &key(b"a"), 128);
    let request = b.from_command(&cmd, Bytes::new(), sink()).unwrap();
    assert_eq!(request.opcode(), Opcode::List);
    assert_eq!(request.buffer_len(), 128);
}

// =============================================================================
// Pool Tests
// =============================================================================

#[test]
fn test_pool_exhaustion() {
    let b = builder(2);
    let first = b.exist(1, &key(b"k"), sink()).unwrap();
    let _second = b.exist(2, &key(b"k"), sink()).unwrap();
    assert_eq!(b.pool().in_use(), 2);

    assert!(matches!(
        b.exist(3, &key(b"k"), sink()),
        Err(KvError::ResourceExhausted(_))
    ));

    first.complete(Ok(Output::Exists(true)));
    assert_eq!(b.pool().in_use(), 1);
    assert!(b.exist(3, &key(b"k"), sink()).is_ok());
}

#[test]
fn test_validation_failure_takes_no_slot() {
    let b = builder(1);
    assert!(b.exist(1, &key(b""), sink()).is_err());
    assert_eq!(b.pool().in_use(), 0);
}

// =============================================================================
// Completion Tests
// =============================================================================

#[test]
fn test_channel_sink_receives_completion() {
    let b = builder(4);
    let (sink, rx) = CompletionSink::channel();
    let request = b
        .retrieve(5, &key(b"k"), 8, RetrieveOptions::default(), sink)
        .unwrap();

    request.complete(Ok(Output::Retrieved {
        value_len: 10,
        data: Bytes::from_static(b"01234567"),
    }));

    let completion = rx.recv().unwrap();
    assert_eq!(completion.cid, 5);
    assert_eq!(completion.status, Status::Success);
    assert_eq!(completion.cdw0, 10);
    assert_eq!(completion.data.unwrap().as_ref(), b"01234567");
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_callback_sink_and_status_mapping() {
    let b = builder(4);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let outcomes = vec![
        Ok(Output::Done),
        Ok(Output::Exists(false)),
        Err(KvError::KeyExists),
        Err(KvError::CapacityExceeded { used: 1, requested: 1, capacity: 1 }),
        Err(KvError::Aborted),
        Err(KvError::Internal("boom".into())),
    ];
    for (cid, outcome) in outcomes.into_iter().enumerate() {
        let seen = Arc::clone(&seen);
        let request = b
            .delete(
                cid as u16,
                &key(b"k"),
                CompletionSink::from_fn(move |c| seen.lock().unwrap().push(c.status)),
            )
            .unwrap();
        request.complete(outcome);
    }

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Status::Success,
            Status::KeyDoesNotExist,
            Status::KeyExists,
            Status::CapacityExceeded,
            Status::AbortRequested,
            Status::InternalDeviceError,
        ]
    );
}

#[test]
fn test_dropped_request_completes_aborted() {
    let b = builder(4);
    let (sink, rx) = CompletionSink::channel();
    let request = b.exist(9, &key(b"k"), sink).unwrap();
    drop(request);

    let completion = rx.recv().unwrap();
    assert_eq!(completion.cid, 9);
    assert_eq!(completion.status, Status::AbortRequested);
    assert!(rx.try_recv().is_err());
    assert_eq!(b.pool().in_use(), 0);
}
