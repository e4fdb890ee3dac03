//! Wire form of a key
//!
//! The 16 key bytes travel as four 32-bit words (`kvkey0..kvkey3`), each
//! holding four consecutive key bytes in little-endian order. The length is
//! carried separately in the command's cdw11.

use crate::error::{KvError, Result};

use super::{Key, MAX_KEY_SIZE};

/// Number of 32-bit words holding key material
pub const KEY_DWORDS: usize = 4;

/// Split a key into its four wire words; unused trailing bytes are zero
pub fn to_dwords(key: &Key) -> [u32; KEY_DWORDS] {
    let bytes = key.padded();
    let mut dwords = [0u32; KEY_DWORDS];
    for (dword, chunk) in dwords.iter_mut().zip(bytes.chunks_exact(4)) {
        *dword = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    dwords
}

/// Rebuild a key from its wire words and the length field
pub fn from_dwords(dwords: [u32; KEY_DWORDS], len: usize) -> Result<Key> {
    if len > MAX_KEY_SIZE {
        return Err(KvError::InvalidKeySize(len));
    }
    let mut bytes = [0u8; MAX_KEY_SIZE];
    for (chunk, dword) in bytes.chunks_exact_mut(4).zip(dwords) {
        chunk.copy_from_slice(&dword.to_le_bytes());
    }
    Ok(Key::from_padded(len, bytes))
}
