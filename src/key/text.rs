//! Text form of a key
//!
//! Two input grammars:
//! - `0x` followed by hex digit pairs, optionally split by `-`. A hyphen may
//!   only follow a non-zero multiple of four hex digits, never repeats and
//!   never ends the string.
//! - anything else is taken verbatim as raw bytes (at most 16).
//!
//! Output is always the canonical form: `0x`, lowercase hex, `-` between
//! every 4-byte group (`0x01020304-05`).

use crate::error::{KvError, Result};

use super::{Key, MAX_KEY_SIZE};

const HEX_PREFIX: &str = "0x";
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Bytes per hyphen-separated group in the canonical form
const GROUP_BYTES: usize = 4;

/// Longest canonical rendering: prefix, 32 digits, 3 hyphens
pub const KEY_STRING_LEN: usize =
    HEX_PREFIX.len() + MAX_KEY_SIZE * 2 + (MAX_KEY_SIZE / GROUP_BYTES - 1);

/// Parse a key from text
pub fn parse_text(s: &str) -> Result<Key> {
    match s.strip_prefix(HEX_PREFIX) {
        Some(hex) => parse_hex(hex),
        None => {
            let raw = s.as_bytes();
            if raw.len() > MAX_KEY_SIZE {
                return Err(KvError::InvalidFormat(format!(
                    "raw key is {} bytes (max {})",
                    raw.len(),
                    MAX_KEY_SIZE
                )));
            }
            Key::new(raw)
        }
    }
}

fn parse_hex(hex: &str) -> Result<Key> {
    let mut bytes = [0u8; MAX_KEY_SIZE];
    let mut len = 0;
    let mut digits = 0usize;
    let mut high: Option<u8> = None;
    let mut after_hyphen = false;

    for (pos, c) in hex.bytes().enumerate() {
        if c == b'-' {
            if digits == 0 || digits % 4 != 0 || after_hyphen {
                return Err(KvError::InvalidFormat(format!(
                    "misplaced '-' at offset {}",
                    pos + HEX_PREFIX.len()
                )));
            }
            after_hyphen = true;
            continue;
        }

        let nibble = hex_value(c).ok_or_else(|| {
            KvError::InvalidFormat(format!(
                "invalid hex digit 0x{:02x} at offset {}",
                c,
                pos + HEX_PREFIX.len()
            ))
        })?;
        after_hyphen = false;
        digits += 1;

        match high.take() {
            None => high = Some(nibble),
            Some(h) => {
                if len == MAX_KEY_SIZE {
                    return Err(KvError::InvalidFormat(format!(
                        "hex key longer than {} bytes",
                        MAX_KEY_SIZE
                    )));
                }
                bytes[len] = (h << 4) | nibble;
                len += 1;
            }
        }
    }

    if high.is_some() {
        return Err(KvError::InvalidFormat("odd number of hex digits".to_string()));
    }
    if after_hyphen {
        return Err(KvError::InvalidFormat("trailing '-'".to_string()));
    }

    Ok(Key::from_padded(len, bytes))
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Length of the canonical rendering of `key`
fn formatted_len(key: &Key) -> usize {
    HEX_PREFIX.len() + key.len() * 2 + key.len().saturating_sub(1) / GROUP_BYTES
}

/// Feed the canonical rendering to `emit`, one ASCII byte at a time
fn render(key: &Key, mut emit: impl FnMut(u8)) {
    HEX_PREFIX.bytes().for_each(&mut emit);
    for (i, byte) in key.as_bytes().iter().enumerate() {
        if i > 0 && i % GROUP_BYTES == 0 {
            emit(b'-');
        }
        emit(HEX_DIGITS[(byte >> 4) as usize]);
        emit(HEX_DIGITS[(byte & 0x0f) as usize]);
    }
}

/// Render `key` into `dest`, returning the number of bytes written
pub fn format_lower_into(key: &Key, dest: &mut [u8]) -> Result<usize> {
    let needed = formatted_len(key);
    if dest.len() < needed {
        return Err(KvError::BufferTooSmall {
            needed,
            available: dest.len(),
        });
    }

    let mut written = 0;
    render(key, |b| {
        dest[written] = b;
        written += 1;
    });
    Ok(written)
}

/// Render `key` in canonical form
pub fn format_lower(key: &Key) -> String {
    let mut out = String::with_capacity(formatted_len(key));
    render(key, |b| out.push(b as char));
    out
}
