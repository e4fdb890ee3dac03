//! Tests for Key
//!
//! These tests verify:
//! - Text parsing (hex and raw grammars) and canonical formatting
//! - Wire dword packing
//! - The (length, bytes) total order and successor

use nvmkv::key::{
    format_lower, format_lower_into, from_dwords, parse_text, to_dwords, KEY_STRING_LEN,
    MAX_KEY_SIZE,
};
use nvmkv::{Key, KvError};

// =============================================================================
// Helper Functions
// =============================================================================

fn key(bytes: &[u8]) -> Key {
    Key::new(bytes).unwrap()
}

/// Small deterministic generator so property loops are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn key(&mut self) -> Key {
        let len = (self.next() % (MAX_KEY_SIZE as u64 + 1)) as usize;
        let bytes: Vec<u8> = (0..len).map(|_| (self.next() % 4) as u8).collect();
        key(&bytes)
    }
}

// =============================================================================
// Text Parsing Tests
// =============================================================================

#[test]
fn test_parse_grouped_hex() {
    let k = parse_text("0x0102-0304").unwrap();
    assert_eq!(k.len(), 4);
    assert_eq!(k.as_bytes(), &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(format_lower(&k), "0x01020304");
}

#[test]
fn test_parse_canonical_hex() {
    let k = parse_text("0x01020304-05").unwrap();
    assert_eq!(k.as_bytes(), &[1, 2, 3, 4, 5]);

    let k = parse_text("0xDEADBEEF").unwrap();
    assert_eq!(k.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn test_parse_raw_text() {
    let k = parse_text("AB").unwrap();
    assert_eq!(k.as_bytes(), b"AB");
    assert_eq!(format_lower(&k), "0x4142");
}

#[test]
fn test_parse_raw_too_long() {
    let err = parse_text("seventeen-bytes!!").unwrap_err();
    assert!(matches!(err, KvError::InvalidFormat(_)));
}

#[test]
fn test_parse_hex_too_long() {
    let s = format!("0x{}", "ab".repeat(17));
    assert!(matches!(parse_text(&s), Err(KvError::InvalidFormat(_))));
}

#[test]
fn test_parse_misplaced_hyphens() {
    for bad in ["0x01-02", "0x-0102", "0x0102--0304", "0x0102-", "0x010-2", "0x0g"] {
        assert!(
            matches!(parse_text(bad), Err(KvError::InvalidFormat(_))),
            "{} should be rejected",
            bad
        );
    }
}

#[test]
fn test_parse_odd_digit_count() {
    assert!(matches!(parse_text("0x123"), Err(KvError::InvalidFormat(_))));
}

#[test]
fn test_parse_empty_hex() {
    let k = parse_text("0x").unwrap();
    assert!(k.is_empty());
    assert_eq!(format_lower(&k), "0x");
}

// =============================================================================
// Formatting Tests
// =============================================================================

#[test]
fn test_format_groups_every_four_bytes() {
    let k = key(&(1..=16).collect::<Vec<u8>>());
    let s = format_lower(&k);
    assert_eq!(s, "0x01020304-05060708-090a0b0c-0d0e0f10");
    assert_eq!(s.len(), KEY_STRING_LEN);
}

#[test]
fn test_format_is_idempotent() {
    let mut rng = Lcg(7);
    for _ in 0..500 {
        let once = format_lower(&rng.key());
        let twice = format_lower(&parse_text(&once).unwrap());
        assert_eq!(once, twice);
    }
}

#[test]
fn test_format_into_buffer() {
    let k = key(&[0xab, 0xcd, 0xef, 0x01, 0x23]);
    let mut buf = [0u8; KEY_STRING_LEN];
    let n = format_lower_into(&k, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"0xabcdef01-23");
}

#[test]
fn test_format_into_small_buffer() {
    let k = key(&[1, 2, 3, 4, 5]);
    let mut buf = [0u8; 8];
    let err = format_lower_into(&k, &mut buf).unwrap_err();
    assert!(matches!(err, KvError::BufferTooSmall { needed: 13, available: 8 }));
}

#[test]
fn test_display_and_from_str() {
    let k: Key = "0x0a0b".parse().unwrap();
    assert_eq!(k.to_string(), "0x0a0b");
    assert_eq!(format!("{:?}", k), "Key(0x0a0b)");
}

// =============================================================================
// Wire Tests
// =============================================================================

#[test]
fn test_dwords_little_endian() {
    let k = key(&[1, 2, 3, 4, 5, 6]);
    let dwords = to_dwords(&k);
    assert_eq!(dwords, [0x0403_0201, 0x0000_0605, 0, 0]);
    assert_eq!(from_dwords(dwords, 6).unwrap(), k);
}

#[test]
fn test_from_dwords_ignores_bytes_past_len() {
    let k = from_dwords([0x0403_0201, 0xffff_ffff, 0, 0], 2).unwrap();
    assert_eq!(k, key(&[1, 2]));
    assert_eq!(to_dwords(&k), [0x0000_0201, 0, 0, 0]);
}

#[test]
fn test_from_dwords_rejects_long_length() {
    assert!(matches!(
        from_dwords([0; 4], 17),
        Err(KvError::InvalidKeySize(17))
    ));
}

#[test]
fn test_key_new_too_long() {
    assert!(matches!(Key::new(&[0; 17]), Err(KvError::InvalidKeySize(17))));
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_shorter_keys_sort_first() {
    assert!(key(&[0xff]) < key(&[0x00, 0x00]));
    assert!(key(b"ab") < key(b"ac"));
    assert!(key(b"") < Key::MIN);
}

#[test]
fn test_order_is_total() {
    let mut rng = Lcg(42);
    let keys: Vec<Key> = (0..60).map(|_| rng.key()).collect();

    for a in &keys {
        for b in &keys {
            let ab = a.cmp(b);
            assert_eq!(ab, b.cmp(a).reverse());
            assert_eq!(ab == std::cmp::Ordering::Equal, a == b);
            assert_eq!(ab, (a.len(), a.as_bytes()).cmp(&(b.len(), b.as_bytes())));
            for c in &keys {
                if a < b && b < c {
                    assert!(a < c);
                }
            }
        }
    }
}

#[test]
fn test_successor() {
    assert_eq!(key(&[0x01]).successor(), Some(key(&[0x02])));
    assert_eq!(key(&[0x01, 0xff]).successor(), Some(key(&[0x02, 0x00])));
    assert_eq!(key(&[0xff]).successor(), Some(key(&[0x00, 0x00])));
    assert_eq!(key(&[0xff; 16]).successor(), None);

    let mut rng = Lcg(3);
    for _ in 0..200 {
        let k = rng.key();
        if let Some(next) = k.successor() {
            assert!(k < next);
        }
    }
}
