//! In-memory engine
//!
//! BTreeMap-based engine with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::config::{Footprint, Namespace};
use crate::error::{KvError, Result};
use crate::key::Key;
use crate::protocol::{ListWriter, StoreOptions};

use super::KvEngine;

#[derive(Debug, Default)]
struct Entries {
    map: BTreeMap<Key, Bytes>,

    /// Sum of the footprint of every entry in `map`
    used: u64,
}

/// Ordered in-memory engine owned by one namespace
#[derive(Debug)]
pub struct MemoryEngine {
    namespace: Namespace,
    capacity: u64,
    footprint: Footprint,
    entries: RwLock<Entries>,
}

impl MemoryEngine {
    /// Create an empty engine
    pub fn new(namespace: Namespace, capacity: u64, footprint: Footprint) -> Self {
        Self {
            namespace,
            capacity,
            footprint,
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map.is_empty()
    }

    /// Capacity currently charged, in footprint units
    pub fn used(&self) -> u64 {
        self.entries.read().used
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn check_key(&self, key: &Key) -> Result<()> {
        if key.is_empty() || key.len() > self.namespace.max_key_len {
            return Err(KvError::InvalidKeySize(key.len()));
        }
        Ok(())
    }
}

impl KvEngine for MemoryEngine {
    fn store(&self, key: &Key, value: Bytes, options: StoreOptions) -> Result<()> {
        self.check_key(key)?;
        if value.len() > self.namespace.max_value_len {
            return Err(KvError::InvalidValueSize(value.len()));
        }

        let mut entries = self.entries.write();

        let previous = entries.map.get(key).map(|v| v.len());
        match previous {
            Some(_) if options.no_overwrite => return Err(KvError::KeyExists),
            None if options.overwrite_only => return Err(KvError::KeyNotFound),
            _ => {}
        }

        let charge = self.footprint.of(key.len(), value.len());
        let refund = previous.map_or(0, |len| self.footprint.of(key.len(), len));
        let projected = entries.used - refund + charge;
        if projected > self.capacity {
            return Err(KvError::CapacityExceeded {
                used: entries.used,
                requested: charge,
                capacity: self.capacity,
            });
        }

        let max_keys = self.namespace.max_num_keys as usize;
        if previous.is_none() && max_keys != 0 && entries.map.len() >= max_keys {
            return Err(KvError::CapacityExceeded {
                used: entries.map.len() as u64,
                requested: 1,
                capacity: max_keys as u64,
            });
        }

        tracing::trace!(
            key = %key,
            value_len = value.len(),
            replaced = previous.is_some(),
            "store"
        );
        entries.map.insert(*key, value);
        entries.used = projected;
        Ok(())
    }

    fn retrieve(&self, key: &Key, dest: &mut [u8]) -> Result<usize> {
        self.check_key(key)?;
        let entries = self.entries.read();
        let value = entries.map.get(key).ok_or(KvError::KeyNotFound)?;

        let n = value.len().min(dest.len());
        dest[..n].copy_from_slice(&value[..n]);
        tracing::trace!(key = %key, value_len = value.len(), copied = n, "retrieve");
        Ok(value.len())
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.check_key(key)?;
        let mut entries = self.entries.write();
        let value = entries.map.remove(key).ok_or(KvError::KeyNotFound)?;

        entries.used -= self.footprint.of(key.len(), value.len());
        tracing::trace!(key = %key, "delete");
        Ok(())
    }

    fn exists(&self, key: &Key) -> Result<bool> {
        self.check_key(key)?;
        Ok(self.entries.read().map.contains_key(key))
    }

    fn list(&self, start: &Key, out: &mut [u8]) -> Result<u32> {
        let mut writer = ListWriter::new(out)?;
        let entries = self.entries.read();

        for key in entries
            .map
            .range((Bound::Included(*start), Bound::Unbounded))
            .map(|(k, _)| k)
        {
            if !writer.push(key) {
                break;
            }
        }

        let count = writer.finish();
        tracing::trace!(start = %start, count, "list");
        Ok(count)
    }
}

