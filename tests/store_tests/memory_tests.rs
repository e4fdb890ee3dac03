//! Tests for MemoryEngine
//!
//! These tests verify:
//! - Store/retrieve/delete/exists semantics
//! - Overwrite policy (no_overwrite, overwrite_only)
//! - Capacity accounting under each footprint policy
//! - Ordered, whole-record list output
//! - Concurrent no_overwrite races

use std::sync::{Arc, Barrier};
use std::thread;

use bytes::Bytes;
use nvmkv::config::{Footprint, Namespace};
use nvmkv::protocol::{decode_list, record_size, StoreOptions, LIST_HEADER_SIZE};
use nvmkv::store::{KvEngine, MemoryEngine};
use nvmkv::{Key, KvError};

// =============================================================================
// Helper Functions
// =============================================================================

fn key(bytes: &[u8]) -> Key {
    Key::new(bytes).unwrap()
}

fn engine() -> MemoryEngine {
    MemoryEngine::new(Namespace::default(), 1 << 20, Footprint::KeyBytes)
}

fn put(engine: &MemoryEngine, k: &[u8], v: &[u8]) {
    engine
        .store(&key(k), Bytes::copy_from_slice(v), StoreOptions::default())
        .unwrap();
}

fn get(engine: &MemoryEngine, k: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; Namespace::DEFAULT_MAX_VALUE_LEN];
    let len = engine.retrieve(&key(k), &mut buf).unwrap();
    buf.truncate(len);
    buf
}

fn list_all(engine: &MemoryEngine, start: &Key, buf_len: usize) -> Vec<Key> {
    let mut buf = vec![0u8; buf_len];
    let count = engine.list(start, &mut buf).unwrap();
    let keys = decode_list(&buf).unwrap();
    assert_eq!(keys.len(), count as usize);
    keys
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_store_then_retrieve() {
    let e = engine();
    let value: Vec<u8> = (0..16).collect();
    put(&e, b"AB", &value);
    assert_eq!(get(&e, b"AB"), value);
}

#[test]
fn test_store_retrieve_value_sizes() {
    let namespace = Namespace {
        max_value_len: 4096,
        ..Namespace::default()
    };
    let e = MemoryEngine::new(namespace, 1 << 20, Footprint::KeyBytes);

    for len in [0usize, 1, 3, 4, 255, 1000, 4095, 4096] {
        let value: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
        e.store(&key(b"v"), Bytes::from(value.clone()), StoreOptions::default())
            .unwrap();

        let mut buf = vec![0u8; 4096];
        let n = e.retrieve(&key(b"v"), &mut buf).unwrap();
        assert_eq!(n, len);
        assert_eq!(&buf[..n], &value[..]);
    }
}

#[test]
fn test_retrieve_truncates_but_reports_full_length() {
    let e = engine();
    put(&e, b"k", b"0123456789");

    let mut buf = [0u8; 4];
    assert_eq!(e.retrieve(&key(b"k"), &mut buf).unwrap(), 10);
    assert_eq!(&buf, b"0123");
}

#[test]
fn test_retrieve_missing() {
    let e = engine();
    let mut buf = [0u8; 4];
    assert!(matches!(e.retrieve(&key(b"nope"), &mut buf), Err(KvError::KeyNotFound)));
}

#[test]
fn test_store_rejects_sizes() {
    let e = MemoryEngine::new(
        Namespace {
            max_key_len: 4,
            max_value_len: 8,
            ..Namespace::default()
        },
        100,
        Footprint::KeyBytes,
    );

    let err = e.store(&key(b"toolong"), Bytes::new(), StoreOptions::default()).unwrap_err();
    assert!(matches!(err, KvError::InvalidKeySize(7)));

    let err = e.store(&key(b""), Bytes::new(), StoreOptions::default()).unwrap_err();
    assert!(matches!(err, KvError::InvalidKeySize(0)));

    let err = e
        .store(&key(b"k"), Bytes::from_static(&[0; 9]), StoreOptions::default())
        .unwrap_err();
    assert!(matches!(err, KvError::InvalidValueSize(9)));
    assert!(e.is_empty());
}

#[test]
fn test_delete() {
    let e = engine();
    assert!(matches!(e.delete(&key(b"k")), Err(KvError::KeyNotFound)));

    put(&e, b"k", b"v");
    assert!(e.exists(&key(b"k")).unwrap());
    e.delete(&key(b"k")).unwrap();
    assert!(!e.exists(&key(b"k")).unwrap());
    assert_eq!(e.used(), 0);
}

// =============================================================================
// Overwrite Policy Tests
// =============================================================================

#[test]
fn test_no_overwrite_keeps_prior_value() {
    let e = engine();
    e.store(&key(b"K"), Bytes::from_static(b"first"), StoreOptions::no_overwrite())
        .unwrap();

    let err = e
        .store(&key(b"K"), Bytes::from_static(b"second"), StoreOptions::no_overwrite())
        .unwrap_err();
    assert!(matches!(err, KvError::KeyExists));
    assert_eq!(get(&e, b"K"), b"first");
}

#[test]
fn test_overwrite_only_on_absent_key() {
    let e = engine();
    put(&e, b"other", b"x");
    let used = e.used();

    let err = e
        .store(&key(b"K"), Bytes::from_static(b"v"), StoreOptions::overwrite_only())
        .unwrap_err();
    assert!(matches!(err, KvError::KeyNotFound));
    assert_eq!(e.len(), 1);
    assert_eq!(e.used(), used);

    put(&e, b"K", b"v1");
    e.store(&key(b"K"), Bytes::from_static(b"v2"), StoreOptions::overwrite_only())
        .unwrap();
    assert_eq!(get(&e, b"K"), b"v2");
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_key_byte_capacity() {
    let e = MemoryEngine::new(Namespace::default(), 10, Footprint::KeyBytes);
    put(&e, b"abcdef", b"value");
    assert_eq!(e.used(), 6);

    let err = e
        .store(&key(b"ghijkl"), Bytes::new(), StoreOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        KvError::CapacityExceeded { used: 6, requested: 6, capacity: 10 }
    ));
    assert_eq!(e.used(), 6);
    assert_eq!(e.len(), 1);
}

#[test]
fn test_delete_restores_capacity() {
    let e = MemoryEngine::new(Namespace::default(), 12, Footprint::KeyBytes);
    put(&e, b"aaaa", b"");
    put(&e, b"bbbb", b"");
    put(&e, b"cccc", b"");
    assert!(e.store(&key(b"dddd"), Bytes::new(), StoreOptions::default()).is_err());

    e.delete(&key(b"bbbb")).unwrap();
    put(&e, b"dddd", b"");
    assert_eq!(e.used(), 12);
}

#[test]
fn test_key_and_value_footprint() {
    let e = MemoryEngine::new(Namespace::default(), 100, Footprint::KeyAndValueBytes);
    put(&e, b"k", &[0; 10]);
    assert_eq!(e.used(), 11);

    // Overwrite charges only the difference
    put(&e, b"k", &[0; 4]);
    assert_eq!(e.used(), 5);
    assert_eq!(e.len(), 1);

    let err = e
        .store(&key(b"big"), Bytes::from(vec![0; 97]), StoreOptions::default())
        .unwrap_err();
    assert!(matches!(err, KvError::CapacityExceeded { .. }));
}

#[test]
fn test_entries_footprint() {
    let e = MemoryEngine::new(Namespace::default(), 2, Footprint::Entries);
    put(&e, b"a", b"");
    put(&e, b"b", b"");
    put(&e, b"a", b"replaced");

    let err = e.store(&key(b"c"), Bytes::new(), StoreOptions::default()).unwrap_err();
    assert!(matches!(err, KvError::CapacityExceeded { .. }));
    assert_eq!(e.used(), 2);
}

#[test]
fn test_max_num_keys() {
    let namespace = Namespace {
        max_num_keys: 2,
        ..Namespace::default()
    };
    let e = MemoryEngine::new(namespace, 1 << 20, Footprint::KeyBytes);
    put(&e, b"a", b"");
    put(&e, b"b", b"");
    put(&e, b"b", b"still fine");

    let err = e.store(&key(b"c"), Bytes::new(), StoreOptions::default()).unwrap_err();
    assert!(matches!(err, KvError::CapacityExceeded { .. }));
}

#[test]
fn test_used_matches_sum_of_entries() {
    let e = MemoryEngine::new(Namespace::default(), 1 << 20, Footprint::KeyAndValueBytes);
    let mut expected: std::collections::BTreeMap<Vec<u8>, usize> = Default::default();

    for i in 0u32..300 {
        let k = (i % 37).to_be_bytes();
        let k = &k[(i % 4) as usize..];
        if i % 5 == 0 {
            let removed = e.delete(&key(k)).is_ok();
            assert_eq!(removed, expected.remove(k).is_some());
        } else {
            let v = vec![0u8; (i % 13) as usize];
            put(&e, k, &v);
            expected.insert(k.to_vec(), v.len());
        }
        let sum: usize = expected.iter().map(|(k, v)| k.len() + v).sum();
        assert_eq!(e.used(), sum as u64);
    }
}

// =============================================================================
// List Tests
// =============================================================================

#[test]
fn test_list_ascending_from_min() {
    let e = engine();
    put(&e, b"k3", b"");
    put(&e, b"k1", b"");
    put(&e, b"k2", b"");

    let keys = list_all(&e, &Key::MIN, 4096);
    assert_eq!(keys, vec![key(b"k1"), key(b"k2"), key(b"k3")]);
}

#[test]
fn test_list_exact_fit() {
    let e = engine();
    put(&e, b"k1", b"");
    put(&e, b"k2", b"");
    put(&e, b"k3", b"");

    let two = LIST_HEADER_SIZE + 2 * record_size(2);
    assert_eq!(list_all(&e, &Key::MIN, two), vec![key(b"k1"), key(b"k2")]);

    // One byte short of the second record
    assert_eq!(list_all(&e, &Key::MIN, two - 1), vec![key(b"k1")]);
}

#[test]
fn test_list_last_record_without_pad() {
    let e = engine();
    put(&e, b"aaa", b"");
    put(&e, b"bbb", b"");
    put(&e, b"ccc", b"");

    // Room for the second record's length and key, not its trailing pad
    let buf_len = LIST_HEADER_SIZE + record_size(3) + 2 + 3;
    assert_eq!(list_all(&e, &Key::MIN, buf_len), vec![key(b"aaa"), key(b"bbb")]);

    // One byte short of the second key
    assert_eq!(list_all(&e, &Key::MIN, buf_len - 1), vec![key(b"aaa")]);
}

#[test]
fn test_list_is_inclusive_and_resumes_with_successor() {
    let e = engine();
    for k in [b"a", b"b", b"c", b"d"] {
        put(&e, k, b"");
    }

    let page = LIST_HEADER_SIZE + 2 * record_size(1);
    let first = list_all(&e, &key(b"b"), page);
    assert_eq!(first, vec![key(b"b"), key(b"c")]);

    let next = first.last().unwrap().successor().unwrap();
    assert_eq!(list_all(&e, &next, page), vec![key(b"d")]);
}

#[test]
fn test_list_orders_by_length_first() {
    let e = engine();
    put(&e, &[0xff, 0xff], b"");
    put(&e, &[0x00, 0x00, 0x00], b"");
    put(&e, &[0x7f], b"");

    let keys = list_all(&e, &Key::MIN, 4096);
    assert_eq!(keys, vec![key(&[0x7f]), key(&[0xff, 0xff]), key(&[0, 0, 0])]);
}

#[test]
fn test_list_buffer_too_small() {
    let e = engine();
    let mut buf = [0u8; 2];
    assert!(matches!(
        e.list(&Key::MIN, &mut buf),
        Err(KvError::BufferTooSmall { .. })
    ));
}

#[test]
fn test_list_empty() {
    let e = engine();
    assert!(list_all(&e, &Key::MIN, 64).is_empty());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_no_overwrite_single_winner() {
    const THREADS: usize = 16;
    let e = Arc::new(engine());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let e = Arc::clone(&e);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                e.store(
                    &key(b"race"),
                    Bytes::from(vec![i as u8]),
                    StoreOptions::no_overwrite(),
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let exists = results
        .iter()
        .filter(|r| matches!(r, Err(KvError::KeyExists)))
        .count();

    assert_eq!(wins, 1);
    assert_eq!(exists, THREADS - 1);
    assert_eq!(e.len(), 1);
}

#[test]
fn test_concurrent_readers_and_writers() {
    let e = Arc::new(engine());
    for i in 0u8..50 {
        put(&e, &[i], &[i; 8]);
    }

    let writers: Vec<_> = (0..4u8)
        .map(|t| {
            let e = Arc::clone(&e);
            thread::spawn(move || {
                for i in 0u8..50 {
                    e.store(&key(&[i]), Bytes::from(vec![t; 8]), StoreOptions::default())
                        .unwrap();
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let e = Arc::clone(&e);
            thread::spawn(move || {
                let mut buf = [0u8; 8];
                for i in 0u8..50 {
                    assert_eq!(e.retrieve(&key(&[i]), &mut buf).unwrap(), 8);
                    // Values are replaced whole, never torn
                    assert!(buf.iter().all(|b| *b == buf[0]));
                }
            })
        })
        .collect();

    for h in writers.into_iter().chain(readers) {
        h.join().unwrap();
    }
    assert_eq!(e.len(), 50);
}
