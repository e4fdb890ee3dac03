//! Store Module
//!
//! The key-value engine contract and its in-memory reference backend.
//!
//! ## Responsibilities
//! - Store/retrieve/delete/exists/list over one namespace
//! - Overwrite policy (`no_overwrite`, `overwrite_only`)
//! - Capacity accounting in configurable footprint units
//! - Ordered iteration for `list`
//!
//! ## Data Structure Choice
//! `MemoryEngine` keeps a BTreeMap behind one RwLock:
//! - Ordered keys (required for list)
//! - Readers share the lock, store/delete hold it across lookup and mutation
//! - Values are `Bytes`, replaced whole and never mutated in place

mod memory;

pub use memory::MemoryEngine;

use bytes::Bytes;

use crate::error::Result;
use crate::key::Key;
use crate::protocol::StoreOptions;

/// Operations every KV backend engine provides
///
/// All operations are atomic with respect to each other.
pub trait KvEngine: Send + Sync {
    /// Insert or replace `key`, subject to `options` and capacity
    fn store(&self, key: &Key, value: Bytes, options: StoreOptions) -> Result<()>;

    /// Copy up to `dest.len()` bytes of the value into `dest`
    ///
    /// Returns the full value length so callers can detect truncation.
    fn retrieve(&self, key: &Key, dest: &mut [u8]) -> Result<usize>;

    /// Remove `key`, failing `KeyNotFound` if absent
    fn delete(&self, key: &Key) -> Result<()>;

    fn exists(&self, key: &Key) -> Result<bool>;

    /// Write keys `>= start` in ascending order into a list buffer
    ///
    /// Stops before the first record that does not fit and returns the
    /// number of records written.
    fn list(&self, start: &Key, out: &mut [u8]) -> Result<u32>;
}
