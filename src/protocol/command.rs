//! Command definitions
//!
//! The decoded form of a 64-byte KV command and its per-opcode fields.

use crate::error::{KvError, Result};
use crate::key::{from_dwords, to_dwords, Key, KEY_DWORDS};

/// KV command set opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Store = 0x01,
    Retrieve = 0x02,
    List = 0x06,
    Delete = 0x10,
    Exist = 0x14,
}

impl Opcode {
    /// Lowercase name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Store => "store",
            Opcode::Retrieve => "retrieve",
            Opcode::List => "list",
            Opcode::Delete => "delete",
            Opcode::Exist => "exist",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = KvError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Opcode::Store),
            0x02 => Ok(Opcode::Retrieve),
            0x06 => Ok(Opcode::List),
            0x10 => Ok(Opcode::Delete),
            0x14 => Ok(Opcode::Exist),
            other => Err(KvError::UnsupportedOpcode(other)),
        }
    }
}

/// Store options (cdw11 bits 8..16)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Fail with KeyNotFound if the key is absent
    pub overwrite_only: bool,

    /// Fail with KeyExists if the key is present
    pub no_overwrite: bool,

    /// Do not compress the value (accepted, no effect)
    pub no_compression: bool,
}

impl StoreOptions {
    const OVERWRITE_ONLY: u8 = 1 << 0;
    const NO_OVERWRITE: u8 = 1 << 1;
    const NO_COMPRESSION: u8 = 1 << 2;

    /// Only create, never replace
    pub fn no_overwrite() -> Self {
        Self {
            no_overwrite: true,
            ..Self::default()
        }
    }

    /// Only replace, never create
    pub fn overwrite_only() -> Self {
        Self {
            overwrite_only: true,
            ..Self::default()
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            overwrite_only: bits & Self::OVERWRITE_ONLY != 0,
            no_overwrite: bits & Self::NO_OVERWRITE != 0,
            no_compression: bits & Self::NO_COMPRESSION != 0,
        }
    }

    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.overwrite_only {
            bits |= Self::OVERWRITE_ONLY;
        }
        if self.no_overwrite {
            bits |= Self::NO_OVERWRITE;
        }
        if self.no_compression {
            bits |= Self::NO_COMPRESSION;
        }
        bits
    }
}

/// Retrieve options (cdw11 bits 8..16)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrieveOptions {
    /// Return the value as stored, without decompression (accepted, no effect)
    pub raw_data: bool,
}

impl RetrieveOptions {
    const RAW_DATA: u8 = 1 << 0;

    pub fn from_bits(bits: u8) -> Self {
        Self {
            raw_data: bits & Self::RAW_DATA != 0,
        }
    }

    pub fn bits(&self) -> u8 {
        if self.raw_data {
            Self::RAW_DATA
        } else {
            0
        }
    }
}

/// Data pointer union (dwords 6-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPointer {
    /// Physical region page entries (PSDT = 0)
    Prp { prp1: u64, prp2: u64 },

    /// Raw scatter-gather descriptor (PSDT != 0)
    Sgl([u8; 16]),
}

impl Default for DataPointer {
    fn default() -> Self {
        DataPointer::Prp { prp1: 0, prp2: 0 }
    }
}

/// A decoded 64-byte KV command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvCommand {
    pub opcode: Opcode,

    /// Fused operation bits (must be 0 for KV commands)
    pub fuse: u8,

    /// PRP or SGL selector for `dptr`
    pub psdt: u8,

    /// Command identifier
    pub cid: u16,

    /// Namespace identifier
    pub nsid: u32,

    /// Key material: words 0-1 from dwords 2-3, words 2-3 from dwords 14-15
    pub key_dwords: [u32; KEY_DWORDS],

    /// Metadata pointer
    pub mptr: u64,

    pub dptr: DataPointer,

    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
}

impl KvCommand {
    const KEY_LEN_MASK: u32 = 0xff;
    const OPTIONS_SHIFT: u32 = 8;

    /// An all-zero command with the given header fields
    pub fn new(opcode: Opcode, cid: u16, nsid: u32) -> Self {
        Self {
            opcode,
            fuse: 0,
            psdt: 0,
            cid,
            nsid,
            key_dwords: [0; KEY_DWORDS],
            mptr: 0,
            dptr: DataPointer::default(),
            cdw10: 0,
            cdw11: 0,
            cdw12: 0,
            cdw13: 0,
        }
    }

    pub fn store(cid: u16, nsid: u32, key: &Key, value_len: u32, options: StoreOptions) -> Self {
        let mut cmd = Self::new(Opcode::Store, cid, nsid);
        cmd.set_key(key);
        cmd.set_option_bits(options.bits());
        cmd.cdw10 = value_len;
        cmd
    }

    pub fn retrieve(
        cid: u16,
        nsid: u32,
        key: &Key,
        host_buffer_len: u32,
        options: RetrieveOptions,
    ) -> Self {
        let mut cmd = Self::new(Opcode::Retrieve, cid, nsid);
        cmd.set_key(key);
        cmd.set_option_bits(options.bits());
        cmd.cdw10 = host_buffer_len;
        cmd
    }

    pub fn delete(cid: u16, nsid: u32, key: &Key) -> Self {
        let mut cmd = Self::new(Opcode::Delete, cid, nsid);
        cmd.set_key(key);
        cmd
    }

    pub fn exist(cid: u16, nsid: u32, key: &Key) -> Self {
        let mut cmd = Self::new(Opcode::Exist, cid, nsid);
        cmd.set_key(key);
        cmd
    }

    pub fn list(cid: u16, nsid: u32, start: &Key, host_buffer_len: u32) -> Self {
        let mut cmd = Self::new(Opcode::List, cid, nsid);
        cmd.set_key(start);
        cmd.cdw10 = host_buffer_len;
        cmd
    }

    /// Place the key in the four key dwords and its length in cdw11
    pub fn set_key(&mut self, key: &Key) {
        self.key_dwords = to_dwords(key);
        self.cdw11 = (self.cdw11 & !Self::KEY_LEN_MASK) | key.len() as u32;
    }

    /// Key length field (cdw11 byte 0 for every KV opcode)
    pub fn key_len(&self) -> usize {
        (self.cdw11 & Self::KEY_LEN_MASK) as usize
    }

    /// Decode the key; a length field above 16 fails `InvalidKeySize`
    pub fn key(&self) -> Result<Key> {
        from_dwords(self.key_dwords, self.key_len())
    }

    /// Option byte (cdw11 byte 1)
    pub fn option_bits(&self) -> u8 {
        (self.cdw11 >> Self::OPTIONS_SHIFT) as u8
    }

    fn set_option_bits(&mut self, bits: u8) {
        self.cdw11 = (self.cdw11 & !(0xff << Self::OPTIONS_SHIFT))
            | ((bits as u32) << Self::OPTIONS_SHIFT);
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::from_bits(self.option_bits())
    }

    pub fn retrieve_options(&self) -> RetrieveOptions {
        RetrieveOptions::from_bits(self.option_bits())
    }

    /// Value size of a STORE
    pub fn value_size(&self) -> u32 {
        self.cdw10
    }

    /// Host buffer size of a RETRIEVE or LIST
    pub fn host_buffer_size(&self) -> u32 {
        self.cdw10
    }

    pub fn is_fused(&self) -> bool {
        self.fuse != 0
    }
}
