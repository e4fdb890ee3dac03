//! Dispatch Module
//!
//! Routes validated requests to a backend, absorbs transient IO resource
//! exhaustion with per-channel FIFO wait queues, and maps outcomes to
//! completion status.
//!
//! ## Request lifecycle
//! ```text
//! Pending ──submit──► Submitted ──► Completed
//!                        │
//!                  no resources
//!                        ▼
//!                     Queued ──drain──► Submitted
//!                        │
//!                      abort ──► Completed (AbortRequested)
//! ```

mod channel;
mod completion;

pub use channel::{AbortOutcome, Channel};
pub use completion::{completion_for, Outcome, Output};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::device::{IoType, KvBackend};
use crate::error::Result;
use crate::request::{RequestBuilder, RequestPool};

/// Front door to one backend
pub struct Dispatcher {
    config: Config,
    backend: Arc<dyn KvBackend>,
    builder: RequestBuilder,
    next_channel: AtomicU64,
}

impl Dispatcher {
    /// Validate `config` and open `backend`
    pub fn new(config: Config, backend: Arc<dyn KvBackend>) -> Result<Self> {
        config.validate()?;
        backend.open()?;

        for io_type in IoType::KV {
            if !backend.io_type_supported(io_type) {
                tracing::warn!(backend = backend.name(), ?io_type, "IO type not supported");
            }
        }

        let builder = RequestBuilder::new(
            config.namespace,
            RequestPool::new(config.max_outstanding_requests),
        );
        tracing::info!(
            backend = backend.name(),
            nsid = config.namespace.id,
            "dispatcher ready"
        );

        Ok(Self {
            config,
            backend,
            builder,
            next_channel: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    /// Request builder bound to this dispatcher's namespace and pool
    pub fn requests(&self) -> &RequestBuilder {
        &self.builder
    }

    /// Open a new channel
    pub fn channel(&self) -> Arc<Channel> {
        let id = self.next_channel.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(channel = id, "channel opened");
        Channel::new(
            id,
            Arc::clone(&self.backend),
            self.config.max_queue_depth,
            self.config.max_retries,
        )
    }

    /// Complete deferred backend IOs
    pub fn poll(&self) -> usize {
        self.backend.poll()
    }

    /// Close the backend
    pub fn shutdown(&self) {
        tracing::info!(backend = self.backend.name(), "dispatcher shutting down");
        self.backend.close();
    }
}
