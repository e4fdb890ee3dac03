//! Channel
//!
//! One submitter's path to the backend, with the FIFO wait queue that
//! holds requests the backend turned away.
//!
//! ## Queue discipline
//! - A request joins the back of the queue when the backend has no IO
//!   resources, or when older requests are already waiting
//! - `drain` resubmits from the front, one request at a time, and puts a
//!   request back at the front if it is turned away again
//! - A queued request is completed only by its resubmission or by abort

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::device::{IoType, IoWaiter, KvBackend, NoResources};
use crate::error::KvError;
use crate::request::Request;

use super::completion::{queue_full, retries_exhausted};

/// Result of an abort request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOutcome {
    /// Removed from the wait queue and completed as aborted
    Aborted,

    /// Forwarded to the backend, which completes it
    Forwarded,

    /// Not queued here and unknown to the backend
    NotFound,
}

#[derive(Default)]
struct WaitState {
    queue: VecDeque<Request>,

    /// A drain loop is running
    draining: bool,

    /// Resources became available while draining
    rerun: bool,

    /// An IO waiter is registered with the backend
    waiting: bool,
}

/// A single-writer submission context
pub struct Channel {
    id: u64,
    backend: Arc<dyn KvBackend>,
    max_queue_depth: usize,
    max_retries: Option<u32>,
    wait: Mutex<WaitState>,
    this: Weak<Channel>,
}

impl Channel {
    pub(crate) fn new(
        id: u64,
        backend: Arc<dyn KvBackend>,
        max_queue_depth: usize,
        max_retries: Option<u32>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            backend,
            max_queue_depth,
            max_retries,
            wait: Mutex::new(WaitState::default()),
            this: this.clone(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests waiting for IO resources
    pub fn queued(&self) -> usize {
        self.wait.lock().queue.len()
    }

    /// Submit a request; its completion arrives through the request's sink
    pub fn submit(&self, mut request: Request) {
        request.set_channel_id(self.id);

        let opcode = request.opcode();
        if !self.backend.io_type_supported(IoType::from(opcode)) {
            request.complete(Err(KvError::UnsupportedOpcode(opcode as u8)));
            return;
        }

        let request = {
            let mut state = self.wait.lock();
            if !state.queue.is_empty() || state.draining {
                tracing::debug!(channel = self.id, cid = request.cid(), "queued behind waiters");
                let overflow = self.enqueue(&mut state, request);
                drop(state);
                Self::reject_overflow(overflow, self.max_queue_depth);
                return;
            }
            request
        };

        tracing::debug!(channel = self.id, cid = request.cid(), opcode = opcode.name(), "submit");
        if let Err(NoResources(request)) = self.backend.submit(request) {
            tracing::debug!(channel = self.id, cid = request.cid(), "no IO resources, queued");
            let overflow = self.enqueue(&mut self.wait.lock(), request);
            Self::reject_overflow(overflow, self.max_queue_depth);
            self.wait_for_resources();
        }
    }

    /// Resubmit queued requests in FIFO order until the queue empties or
    /// the backend runs out of resources again
    pub fn drain(&self) {
        {
            let mut state = self.wait.lock();
            if state.draining {
                state.rerun = true;
                return;
            }
            state.draining = true;
            state.rerun = false;
        }

        loop {
            let request = {
                let mut state = self.wait.lock();
                match state.queue.pop_front() {
                    Some(request) => {
                        // Only a wakeup during this attempt counts
                        state.rerun = false;
                        request
                    }
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };

            let cid = request.cid();
            let NoResources(mut request) = match self.backend.submit(request) {
                Ok(()) => {
                    tracing::debug!(channel = self.id, cid, "resubmitted");
                    continue;
                }
                Err(rejected) => rejected,
            };

            let attempts = request.record_attempt();
            if self.max_retries.is_some_and(|max| attempts > max) {
                request.complete(Err(retries_exhausted(attempts)));
                continue;
            }

            self.wait.lock().queue.push_front(request);
            self.wait_for_resources();

            let mut state = self.wait.lock();
            if state.rerun {
                state.rerun = false;
                continue;
            }
            state.draining = false;
            return;
        }
    }

    /// Abort the request with `cid`
    pub fn abort(&self, cid: u16) -> AbortOutcome {
        let queued = {
            let mut state = self.wait.lock();
            state
                .queue
                .iter()
                .position(|r| r.cid() == cid)
                .and_then(|pos| state.queue.remove(pos))
        };

        if let Some(request) = queued {
            tracing::debug!(channel = self.id, cid, "aborted while queued");
            request.complete(Err(KvError::Aborted));
            return AbortOutcome::Aborted;
        }

        if self.backend.abort(self.id, cid) {
            tracing::debug!(channel = self.id, cid, "abort forwarded to backend");
            AbortOutcome::Forwarded
        } else {
            AbortOutcome::NotFound
        }
    }

    /// Fail every queued request as aborted
    pub fn abort_all(&self) -> usize {
        let queued = std::mem::take(&mut self.wait.lock().queue);
        let count = queued.len();
        for request in queued {
            request.complete(Err(KvError::Aborted));
        }
        count
    }

    /// Append to the wait queue, handing the request back if it is full
    fn enqueue(&self, state: &mut WaitState, request: Request) -> Option<Request> {
        if state.queue.len() >= self.max_queue_depth {
            tracing::warn!(channel = self.id, cid = request.cid(), "wait queue full");
            return Some(request);
        }
        state.queue.push_back(request);
        None
    }

    fn reject_overflow(overflow: Option<Request>, depth: usize) {
        if let Some(request) = overflow {
            request.complete(Err(queue_full(depth)));
        }
    }

    fn wait_for_resources(&self) {
        {
            let mut state = self.wait.lock();
            if state.waiting {
                return;
            }
            state.waiting = true;
        }

        if let Some(this) = self.this.upgrade() {
            self.backend.queue_io_wait(this);
        }
    }
}

impl IoWaiter for Channel {
    fn resources_available(&self) {
        self.wait.lock().waiting = false;
        self.drain();
    }
}
