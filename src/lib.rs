//! # nvmkv
//!
//! A key-value command set for a block-storage controller:
//! - 64-byte wire commands with keys of up to 16 bytes
//! - Per-channel FIFO backpressure with exactly-once completion
//! - Ordered in-memory engine with overwrite policy and capacity accounting
//! - TCP transport carrying framed commands
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one channel per connection)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ 64-byte commands
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Request Builder                            │
//! │        (namespace limits, bounded request pool)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Dispatcher                               │
//! │      (FIFO wait queue per channel, status mapping)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ submit / NoResources / io-wait
//!          ┌────────────▼────────────┐
//!          │      Memory Device      │
//!          │     (bounded IO pool)   │
//!          └────────────┬────────────┘
//!                       │
//!                       ▼
//!               ┌───────────────┐
//!               │  KV Engine    │
//!               │ (RwLock map)  │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod protocol;
pub mod store;
pub mod request;
pub mod dispatch;
pub mod device;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, Namespace};
pub use key::Key;
pub use dispatch::Dispatcher;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of nvmkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
