//! Requests
//!
//! Validated, owned command objects produced by [`RequestBuilder`] and
//! consumed by the dispatcher. A request is completed by value, so the
//! completion sink fires at most once; dropping an uncompleted request
//! reports it aborted, so it also fires at least once.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};

use crate::config::Namespace;
use crate::dispatch::{completion_for, Outcome};
use crate::error::{KvError, Result};
use crate::key::Key;
use crate::protocol::{
    Completion, KvCommand, Opcode, RetrieveOptions, StoreOptions, LIST_HEADER_SIZE,
};

// =============================================================================
// Completion Sink
// =============================================================================

enum SinkKind {
    Channel(Sender<Completion>),
    Callback(Box<dyn FnOnce(Completion) + Send>),
}

/// Where a request's completion is delivered
pub struct CompletionSink {
    kind: SinkKind,
}

impl CompletionSink {
    /// A sink backed by a fresh unbounded channel
    pub fn channel() -> (Self, Receiver<Completion>) {
        let (tx, rx) = channel::unbounded();
        (Self::from_sender(tx), rx)
    }

    /// A sink that sends into an existing channel
    pub fn from_sender(tx: Sender<Completion>) -> Self {
        Self {
            kind: SinkKind::Channel(tx),
        }
    }

    /// A sink that invokes `f` with the completion
    pub fn from_fn(f: impl FnOnce(Completion) + Send + 'static) -> Self {
        Self {
            kind: SinkKind::Callback(Box::new(f)),
        }
    }

    fn deliver(self, completion: Completion) {
        match self.kind {
            SinkKind::Channel(tx) => {
                if tx.send(completion).is_err() {
                    tracing::debug!("completion receiver dropped");
                }
            }
            SinkKind::Callback(f) => f(completion),
        }
    }
}

impl fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SinkKind::Channel(_) => f.write_str("CompletionSink::Channel"),
            SinkKind::Callback(_) => f.write_str("CompletionSink::Callback"),
        }
    }
}

// =============================================================================
// Request Pool
// =============================================================================

#[derive(Debug)]
struct PoolState {
    capacity: usize,
    in_use: AtomicUsize,
}

/// Bounds the number of live requests
#[derive(Debug, Clone)]
pub struct RequestPool {
    state: Arc<PoolState>,
}

impl RequestPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(PoolState {
                capacity,
                in_use: AtomicUsize::new(0),
            }),
        }
    }

    /// Reserve one slot, failing `ResourceExhausted` when the pool is empty
    pub fn acquire(&self) -> Result<PoolSlot> {
        let capacity = self.state.capacity;
        self.state
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| {
                KvError::ResourceExhausted(format!("all {} request slots in use", capacity))
            })?;

        Ok(PoolSlot {
            state: Arc::clone(&self.state),
        })
    }

    pub fn in_use(&self) -> usize {
        self.state.in_use.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }
}

/// A reserved pool slot, released on drop
#[derive(Debug)]
pub struct PoolSlot {
    state: Arc<PoolState>,
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.state.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

// =============================================================================
// Request
// =============================================================================

/// A validated KV command waiting to be executed
#[derive(Debug)]
pub struct Request {
    cid: u16,
    opcode: Opcode,
    nsid: u32,
    key: Key,
    value: Option<Bytes>,
    buffer_len: usize,
    store_options: StoreOptions,
    retrieve_options: RetrieveOptions,
    channel_id: u64,
    attempts: u32,
    sink: Option<CompletionSink>,
    slot: Option<PoolSlot>,
}

impl Request {
    pub fn cid(&self) -> u16 {
        self.cid
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn nsid(&self) -> u32 {
        self.nsid
    }

    /// Key, or start key for a list
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Value to store
    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    /// Host buffer size of a retrieve or list
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    pub fn store_options(&self) -> StoreOptions {
        self.store_options
    }

    pub fn retrieve_options(&self) -> RetrieveOptions {
        self.retrieve_options
    }

    /// Channel the request was submitted on
    pub fn channel_id(&self) -> u64 {
        self.channel_id
    }

    pub(crate) fn set_channel_id(&mut self, id: u64) {
        self.channel_id = id;
    }

    /// Times the backend has turned this request away
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Deliver the completion for `outcome`, consuming the request
    pub fn complete(mut self, outcome: Outcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Outcome) {
        let completion = completion_for(self.cid, self.opcode, outcome);
        // Slot is free before the sink observes the completion
        self.slot.take();
        if let Some(sink) = self.sink.take() {
            sink.deliver(completion);
        }
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if self.sink.is_some() {
            tracing::debug!(
                cid = self.cid,
                opcode = self.opcode.name(),
                "request dropped uncompleted"
            );
            self.finish(Err(KvError::Aborted));
        }
    }
}

// =============================================================================
// Request Builder
// =============================================================================

/// Validates caller input against the namespace and allocates requests
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    namespace: Namespace,
    pool: RequestPool,
}

impl RequestBuilder {
    pub fn new(namespace: Namespace, pool: RequestPool) -> Self {
        Self { namespace, pool }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn pool(&self) -> &RequestPool {
        &self.pool
    }

    /// Build a STORE request
    pub fn store(
        &self,
        cid: u16,
        key: &Key,
        value: impl Into<Bytes>,
        options: StoreOptions,
        sink: CompletionSink,
    ) -> Result<Request> {
        let value = value.into();
        self.check_key(key)?;
        self.check_value_len(value.len())?;

        let mut request = self.allocate(Opcode::Store, cid, *key, sink)?;
        request.value = Some(value);
        request.store_options = options;
        Ok(request)
    }

    /// Build a RETRIEVE request reading into a buffer of `buffer_len` bytes
    pub fn retrieve(
        &self,
        cid: u16,
        key: &Key,
        buffer_len: usize,
        options: RetrieveOptions,
        sink: CompletionSink,
    ) -> Result<Request> {
        self.check_key(key)?;
        self.check_value_len(buffer_len)?;

        let mut request = self.allocate(Opcode::Retrieve, cid, *key, sink)?;
        request.buffer_len = buffer_len;
        request.retrieve_options = options;
        Ok(request)
    }

    /// Build a DELETE request
    pub fn delete(&self, cid: u16, key: &Key, sink: CompletionSink) -> Result<Request> {
        self.check_key(key)?;
        self.allocate(Opcode::Delete, cid, *key, sink)
    }

    /// Build an EXIST request
    pub fn exist(&self, cid: u16, key: &Key, sink: CompletionSink) -> Result<Request> {
        self.check_key(key)?;
        self.allocate(Opcode::Exist, cid, *key, sink)
    }

    /// Build a LIST request starting at `start` (inclusive)
    pub fn list(
        &self,
        cid: u16,
        start: &Key,
        buffer_len: usize,
        sink: CompletionSink,
    ) -> Result<Request> {
        self.check_key(start)?;
        if buffer_len < LIST_HEADER_SIZE {
            return Err(KvError::InvalidField(format!(
                "list buffer of {} bytes cannot hold the record count",
                buffer_len
            )));
        }

        let mut request = self.allocate(Opcode::List, cid, *start, sink)?;
        request.buffer_len = buffer_len;
        Ok(request)
    }

    /// Build a request from a decoded wire command and its data payload
    pub fn from_command(
        &self,
        cmd: &KvCommand,
        payload: Bytes,
        sink: CompletionSink,
    ) -> Result<Request> {
        if cmd.is_fused() {
            return Err(KvError::InvalidField(format!(
                "fused operation 0x{:x} on a KV command",
                cmd.fuse
            )));
        }
        if cmd.nsid != self.namespace.id {
            return Err(KvError::InvalidField(format!(
                "namespace {} (expected {})",
                cmd.nsid, self.namespace.id
            )));
        }

        let key = cmd.key()?;
        match cmd.opcode {
            Opcode::Store => {
                let value_len = cmd.value_size() as usize;
                self.check_value_len(value_len)?;
                if payload.len() != value_len {
                    return Err(KvError::InvalidField(format!(
                        "store carries {} bytes, value size says {}",
                        payload.len(),
                        value_len
                    )));
                }
                self.store(cmd.cid, &key, payload, cmd.store_options(), sink)
            }
            Opcode::Retrieve => self.retrieve(
                cmd.cid,
                &key,
                cmd.host_buffer_size() as usize,
                cmd.retrieve_options(),
                sink,
            ),
            Opcode::Delete => self.delete(cmd.cid, &key, sink),
            Opcode::Exist => self.exist(cmd.cid, &key, sink),
            Opcode::List => self.list(cmd.cid, &key, cmd.host_buffer_size() as usize, sink),
        }
    }

    fn check_key(&self, key: &Key) -> Result<()> {
        if key.is_empty() || key.len() > self.namespace.max_key_len {
            return Err(KvError::InvalidKeySize(key.len()));
        }
        Ok(())
    }

    fn check_value_len(&self, len: usize) -> Result<()> {
        if len > self.namespace.max_value_len {
            return Err(KvError::InvalidValueSize(len));
        }
        Ok(())
    }

    fn allocate(&self, opcode: Opcode, cid: u16, key: Key, sink: CompletionSink) -> Result<Request> {
        let slot = self.pool.acquire()?;
        Ok(Request {
            cid,
            opcode,
            nsid: self.namespace.id,
            key,
            value: None,
            buffer_len: 0,
            store_options: StoreOptions::default(),
            retrieve_options: RetrieveOptions::default(),
            channel_id: 0,
            attempts: 0,
            sink: Some(sink),
            slot: Some(slot),
        })
    }
}
