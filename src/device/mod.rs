//! Device Module
//!
//! The block-device contract a KV backend implements, and an engine-backed
//! in-memory device.
//!
//! ## Contract
//! - `open`/`close` bracket the device lifetime
//! - `io_type_supported` gates which opcodes reach the device
//! - `submit` either takes ownership of the request (and completes it, now
//!   or later) or hands it back in [`NoResources`]
//! - `queue_io_wait` registers interest in the next free IO resource

mod memory;

pub use memory::MemoryDevice;

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::protocol::Opcode;
use crate::request::Request;

/// IO types a device may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoType {
    Read,
    Write,
    Unmap,
    Flush,
    KvStore,
    KvRetrieve,
    KvDelete,
    KvExist,
    KvList,
}

impl IoType {
    /// Every KV command IO type
    pub const KV: [IoType; 5] = [
        IoType::KvStore,
        IoType::KvRetrieve,
        IoType::KvDelete,
        IoType::KvExist,
        IoType::KvList,
    ];
}

impl From<Opcode> for IoType {
    fn from(opcode: Opcode) -> Self {
        match opcode {
            Opcode::Store => IoType::KvStore,
            Opcode::Retrieve => IoType::KvRetrieve,
            Opcode::Delete => IoType::KvDelete,
            Opcode::Exist => IoType::KvExist,
            Opcode::List => IoType::KvList,
        }
    }
}

/// A request the device had no IO resource for, handed back to the caller
pub struct NoResources(pub Request);

impl fmt::Debug for NoResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoResources(cid {})", self.0.cid())
    }
}

/// Notified when a device IO resource frees up
pub trait IoWaiter: Send + Sync {
    fn resources_available(&self);
}

/// A device that executes KV requests
pub trait KvBackend: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> Result<()>;

    /// Close the device; requests it still holds are completed
    fn close(&self);

    fn io_type_supported(&self, io_type: IoType) -> bool;

    /// Take ownership of `request` or hand it back when out of IO resources
    fn submit(&self, request: Request) -> std::result::Result<(), NoResources>;

    /// Abort a request the device holds; false if it is not (or no longer) held
    fn abort(&self, channel_id: u64, cid: u16) -> bool;

    /// Run `waiter` once an IO resource is free (at once if one already is)
    fn queue_io_wait(&self, waiter: Arc<dyn IoWaiter>);

    /// Complete deferred IOs, returning how many finished
    fn poll(&self) -> usize;
}
