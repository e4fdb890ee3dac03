//! Key Module
//!
//! The 0–16 byte key used by every KV command, and the conversions between
//! its three representations.
//!
//! ## Representations
//! - **In memory**: [`Key`], an explicit length plus a zero-padded 16-byte array
//! - **Wire**: four little-endian 32-bit words, length carried separately (see `wire.rs`)
//! - **Text**: `0x`-prefixed hex grouped by 4 bytes, or raw bytes (see `text.rs`)
//!
//! ## Ordering
//! Shorter keys sort first; keys of equal length compare bytewise.

mod text;
mod wire;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{KvError, Result};

pub use text::{format_lower, format_lower_into, parse_text, KEY_STRING_LEN};
pub use wire::{from_dwords, to_dwords, KEY_DWORDS};

/// Maximum key size in bytes
pub const MAX_KEY_SIZE: usize = 16;

/// A KV key: up to 16 raw bytes with an explicit length
///
/// Bytes past `len` are always zero, so the derived equality and hash only
/// see the meaningful prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Key {
    len: u8,
    bytes: [u8; MAX_KEY_SIZE],
}

impl Key {
    /// The smallest storable key: one zero byte
    pub const MIN: Key = Key {
        len: 1,
        bytes: [0; MAX_KEY_SIZE],
    };

    /// Create a key from raw bytes
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_KEY_SIZE {
            return Err(KvError::InvalidKeySize(bytes.len()));
        }
        let mut padded = [0u8; MAX_KEY_SIZE];
        padded[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            len: bytes.len() as u8,
            bytes: padded,
        })
    }

    /// Build from an already zero-padded array (len must be <= 16)
    pub(crate) fn from_padded(len: usize, mut bytes: [u8; MAX_KEY_SIZE]) -> Self {
        debug_assert!(len <= MAX_KEY_SIZE);
        bytes[len..].fill(0);
        Self {
            len: len as u8,
            bytes,
        }
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The meaningful key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// All 16 bytes, zero padded
    pub fn padded(&self) -> &[u8; MAX_KEY_SIZE] {
        &self.bytes
    }

    /// The next key in the total order, `None` after the greatest key
    ///
    /// `list` is inclusive of its start key; resuming with
    /// `last_listed.successor()` continues without repeating `last_listed`.
    pub fn successor(&self) -> Option<Key> {
        let len = self.len();
        let mut next = *self;
        for i in (0..len).rev() {
            if next.bytes[i] == u8::MAX {
                next.bytes[i] = 0;
            } else {
                next.bytes[i] += 1;
                return Some(next);
            }
        }

        // Every byte wrapped: smallest key one byte longer
        if len == MAX_KEY_SIZE {
            return None;
        }
        Some(Key {
            len: len as u8 + 1,
            bytes: [0; MAX_KEY_SIZE],
        })
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.len
            .cmp(&other.len)
            .then_with(|| self.as_bytes().cmp(other.as_bytes()))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", format_lower(self))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_lower(self))
    }
}

impl FromStr for Key {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        parse_text(s)
    }
}

impl TryFrom<&[u8]> for Key {
    type Error = KvError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Key::new(bytes)
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
