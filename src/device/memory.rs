//! Memory device
//!
//! Runs requests against a [`KvEngine`] with a bounded pool of IO slots.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, MutexGuard};

use crate::config::CompletionMode;
use crate::dispatch::{Outcome, Output};
use crate::error::{KvError, Result};
use crate::protocol::Opcode;
use crate::request::Request;
use crate::store::KvEngine;

use super::{IoType, IoWaiter, KvBackend, NoResources};

#[derive(Default)]
struct DeviceState {
    /// IO slots taken
    in_flight: usize,

    /// Deferred IOs awaiting `poll`, each holding a slot
    parked: VecDeque<Request>,

    waiters: VecDeque<Arc<dyn IoWaiter>>,
}

/// Engine-backed device
pub struct MemoryDevice {
    name: String,
    engine: Arc<dyn KvEngine>,
    io_pool_size: usize,
    mode: CompletionMode,
    open: AtomicBool,
    state: Mutex<DeviceState>,
}

impl MemoryDevice {
    pub fn new(
        name: impl Into<String>,
        engine: Arc<dyn KvEngine>,
        io_pool_size: usize,
        mode: CompletionMode,
    ) -> Self {
        Self {
            name: name.into(),
            engine,
            io_pool_size,
            mode,
            open: AtomicBool::new(false),
            state: Mutex::new(DeviceState::default()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn KvEngine> {
        &self.engine
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// IO slots currently taken
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Deferred IOs waiting for `poll`
    pub fn pending(&self) -> usize {
        self.state.lock().parked.len()
    }

    fn execute(&self, request: &Request) -> Outcome {
        let engine = &self.engine;
        match request.opcode() {
            Opcode::Store => {
                let value = request.value().cloned().unwrap_or_default();
                engine.store(request.key(), value, request.store_options())?;
                Ok(Output::Done)
            }
            Opcode::Retrieve => {
                let mut buf = BytesMut::zeroed(request.buffer_len());
                let value_len = engine.retrieve(request.key(), &mut buf)?;
                buf.truncate(value_len.min(request.buffer_len()));
                Ok(Output::Retrieved {
                    value_len,
                    data: buf.freeze(),
                })
            }
            Opcode::Delete => {
                engine.delete(request.key())?;
                Ok(Output::Done)
            }
            Opcode::Exist => Ok(Output::Exists(engine.exists(request.key())?)),
            Opcode::List => {
                let mut buf = vec![0u8; request.buffer_len()];
                let count = engine.list(request.key(), &mut buf)?;
                Ok(Output::Listed {
                    count,
                    data: Bytes::from(buf),
                })
            }
        }
    }

    fn run(&self, request: Request) {
        let outcome = self.execute(&request);
        request.complete(outcome);
        self.release_slot();
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.in_flight -= 1;
        self.wake_waiters(state);
    }

    /// Hand free slots to waiters, one waiter at a time
    fn wake_waiters<'a>(&'a self, mut state: MutexGuard<'a, DeviceState>) {
        while state.in_flight < self.io_pool_size {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            drop(state);
            waiter.resources_available();
            state = self.state.lock();
        }
    }
}

impl KvBackend for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<()> {
        if self.io_pool_size == 0 {
            return Err(KvError::Config(format!(
                "device {} has an empty IO pool",
                self.name
            )));
        }
        self.open.store(true, Ordering::Release);
        tracing::debug!(device = %self.name, pool = self.io_pool_size, mode = ?self.mode, "device opened");
        Ok(())
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }

        let parked = std::mem::take(&mut self.state.lock().parked);
        let count = parked.len();
        for request in parked {
            request.complete(Err(KvError::Unrecovered(format!("device {} closed", self.name))));
            self.release_slot();
        }
        tracing::debug!(device = %self.name, dropped_ios = count, "device closed");
    }

    fn io_type_supported(&self, io_type: IoType) -> bool {
        IoType::KV.contains(&io_type)
    }

    fn submit(&self, request: Request) -> std::result::Result<(), NoResources> {
        if !self.is_open() {
            request.complete(Err(KvError::Unrecovered(format!(
                "device {} is not open",
                self.name
            ))));
            return Ok(());
        }

        let mut state = self.state.lock();
        if state.in_flight >= self.io_pool_size {
            return Err(NoResources(request));
        }
        state.in_flight += 1;

        match self.mode {
            CompletionMode::Inline => {
                drop(state);
                self.run(request);
            }
            CompletionMode::Deferred => state.parked.push_back(request),
        }
        Ok(())
    }

    fn abort(&self, channel_id: u64, cid: u16) -> bool {
        let request = {
            let mut state = self.state.lock();
            let Some(pos) = state
                .parked
                .iter()
                .position(|r| r.channel_id() == channel_id && r.cid() == cid)
            else {
                return false;
            };
            state.parked.remove(pos)
        };

        match request {
            Some(request) => {
                request.complete(Err(KvError::Aborted));
                self.release_slot();
                true
            }
            None => false,
        }
    }

    fn queue_io_wait(&self, waiter: Arc<dyn IoWaiter>) {
        let mut state = self.state.lock();
        state.waiters.push_back(waiter);
        self.wake_waiters(state);
    }

    fn poll(&self) -> usize {
        let parked = std::mem::take(&mut self.state.lock().parked);
        let count = parked.len();
        for request in parked {
            self.run(request);
        }
        count
    }
}
