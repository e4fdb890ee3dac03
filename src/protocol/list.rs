//! List buffer
//!
//! A bounds-checked writer for the list response buffer and the matching
//! reader. Records are `u16` key length plus key bytes, each padded to a
//! 4-byte boundary, behind a `u32` record count. The pad of the final
//! record is dropped when the buffer ends first.

use bytes::{Buf, BufMut};

use crate::error::{KvError, Result};
use crate::key::Key;

/// Size of the leading record counter
pub const LIST_HEADER_SIZE: usize = 4;

const RECORD_ALIGN: usize = 4;
const KEY_LEN_FIELD: usize = 2;

/// Padded size of one record for a key of `key_len` bytes
pub fn record_size(key_len: usize) -> usize {
    (KEY_LEN_FIELD + key_len + RECORD_ALIGN - 1) / RECORD_ALIGN * RECORD_ALIGN
}

/// Appends whole records to a caller-owned buffer
#[derive(Debug)]
pub struct ListWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
    count: u32,
}

impl<'a> ListWriter<'a> {
    /// Fails `BufferTooSmall` if `buf` cannot hold the record counter
    pub fn new(buf: &'a mut [u8]) -> Result<Self> {
        if buf.len() < LIST_HEADER_SIZE {
            return Err(KvError::BufferTooSmall {
                needed: LIST_HEADER_SIZE,
                available: buf.len(),
            });
        }
        Ok(Self {
            buf,
            offset: LIST_HEADER_SIZE,
            count: 0,
        })
    }

    /// Append a record for `key` if its length field and key bytes fit.
    /// The trailing pad of the last record may fall off the buffer end.
    pub fn push(&mut self, key: &Key) -> bool {
        if KEY_LEN_FIELD + key.len() > self.remaining() {
            return false;
        }

        let size = record_size(key.len()).min(self.remaining());
        let record = &mut self.buf[self.offset..self.offset + size];
        record.fill(0);
        let mut out = &mut record[..];
        out.put_u16_le(key.len() as u16);
        out.put_slice(key.as_bytes());

        self.offset += size;
        self.count += 1;
        true
    }

    /// Bytes left for records
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Bytes written so far, counter included
    pub fn written(&self) -> usize {
        self.offset
    }

    /// Write the record counter and return it
    pub fn finish(self) -> u32 {
        let mut head = &mut self.buf[..LIST_HEADER_SIZE];
        head.put_u32_le(self.count);
        self.count
    }
}

/// Read the keys out of a list buffer
pub fn decode_list(buf: &[u8]) -> Result<Vec<Key>> {
    if buf.len() < LIST_HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "list buffer of {} bytes has no record counter",
            buf.len()
        )));
    }

    let mut reader = buf;
    let count = reader.get_u32_le() as usize;
    let mut keys = Vec::with_capacity(count.min(reader.len() / RECORD_ALIGN));

    for i in 0..count {
        if reader.remaining() < KEY_LEN_FIELD {
            return Err(KvError::Protocol(format!("list record {} truncated", i)));
        }
        let key_len = u16::from_le_bytes([reader[0], reader[1]]) as usize;
        let needed = KEY_LEN_FIELD + key_len;
        if reader.remaining() < needed {
            return Err(KvError::Protocol(format!(
                "list record {} needs {} bytes, {} left",
                i,
                needed,
                reader.remaining()
            )));
        }
        keys.push(Key::new(&reader[KEY_LEN_FIELD..needed])?);
        reader.advance(record_size(key_len).min(reader.remaining()));
    }

    Ok(keys)
}
