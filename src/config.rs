//! Configuration for nvmkv
//!
//! Centralized configuration with sensible defaults, plus the namespace
//! descriptor every layer validates against.

use crate::error::{KvError, Result};
use crate::key::MAX_KEY_SIZE;

/// Namespace descriptor: the limits a KV namespace advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    /// Namespace identifier carried in every command
    pub id: u32,

    /// Largest accepted key, 1..=16 bytes
    pub max_key_len: usize,

    /// Largest accepted value (bytes)
    pub max_value_len: usize,

    /// Maximum number of stored keys, 0 = unlimited
    pub max_num_keys: u32,
}

impl Namespace {
    /// Default value size limit (1 MiB)
    pub const DEFAULT_MAX_VALUE_LEN: usize = 1024 * 1024;

    /// Check that the advertised limits make sense
    pub fn validate(&self) -> Result<()> {
        if self.max_key_len == 0 || self.max_key_len > MAX_KEY_SIZE {
            return Err(KvError::Config(format!(
                "max_key_len must be within 1..={}, got {}",
                MAX_KEY_SIZE, self.max_key_len
            )));
        }
        if self.max_value_len > u32::MAX as usize {
            return Err(KvError::Config(format!(
                "max_value_len {} does not fit a 32-bit size field",
                self.max_value_len
            )));
        }
        Ok(())
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self {
            id: 1,
            max_key_len: MAX_KEY_SIZE,
            max_value_len: Self::DEFAULT_MAX_VALUE_LEN,
            max_num_keys: 0,
        }
    }
}

/// What a stored entry charges against the engine capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Footprint {
    /// Key length only (values are free)
    #[default]
    KeyBytes,

    /// Key length plus value length
    KeyAndValueBytes,

    /// One unit per entry
    Entries,
}

impl Footprint {
    /// Footprint of one entry
    pub fn of(self, key_len: usize, value_len: usize) -> u64 {
        match self {
            Footprint::KeyBytes => key_len as u64,
            Footprint::KeyAndValueBytes => (key_len + value_len) as u64,
            Footprint::Entries => 1,
        }
    }
}

/// When a device delivers completions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Execute and complete inside `submit`
    #[default]
    Inline,

    /// Park IOs until the device is polled
    Deferred,
}

/// Main configuration for an nvmkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Namespace / Engine Configuration
    // -------------------------------------------------------------------------
    /// Namespace limits
    pub namespace: Namespace,

    /// Capacity in footprint units
    pub capacity: u64,

    /// Capacity accounting policy
    pub footprint: Footprint,

    // -------------------------------------------------------------------------
    // Device Configuration
    // -------------------------------------------------------------------------
    /// Number of IOs the device can hold in flight
    pub io_pool_size: usize,

    /// Inline or deferred completion
    pub completion_mode: CompletionMode,

    // -------------------------------------------------------------------------
    // Dispatcher Configuration
    // -------------------------------------------------------------------------
    /// Max live requests per dispatcher (request pool)
    pub max_outstanding_requests: usize,

    /// Max requests parked on one channel's wait queue
    pub max_queue_depth: usize,

    /// Resubmission limit for a queued request, None = unbounded
    pub max_retries: Option<u32>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: Namespace::default(),
            capacity: 64 * 1024 * 1024,
            footprint: Footprint::KeyBytes,
            io_pool_size: 128,
            completion_mode: CompletionMode::Inline,
            max_outstanding_requests: 1024,
            max_queue_depth: 1024,
            max_retries: None,
            listen_addr: "127.0.0.1:4420".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the configuration before anything is built from it
    pub fn validate(&self) -> Result<()> {
        self.namespace.validate()?;
        if self.io_pool_size == 0 {
            return Err(KvError::Config("io_pool_size must be greater than 0".to_string()));
        }
        if self.max_outstanding_requests == 0 {
            return Err(KvError::Config(
                "max_outstanding_requests must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the whole namespace descriptor
    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.config.namespace = namespace;
        self
    }

    /// Set the namespace id
    pub fn namespace_id(mut self, id: u32) -> Self {
        self.config.namespace.id = id;
        self
    }

    /// Set the largest accepted key length
    pub fn max_key_len(mut self, len: usize) -> Self {
        self.config.namespace.max_key_len = len;
        self
    }

    /// Set the largest accepted value length
    pub fn max_value_len(mut self, len: usize) -> Self {
        self.config.namespace.max_value_len = len;
        self
    }

    /// Set the maximum number of keys (0 = unlimited)
    pub fn max_num_keys(mut self, count: u32) -> Self {
        self.config.namespace.max_num_keys = count;
        self
    }

    /// Set the engine capacity (in footprint units)
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the capacity accounting policy
    pub fn footprint(mut self, footprint: Footprint) -> Self {
        self.config.footprint = footprint;
        self
    }

    /// Set the device IO pool size
    pub fn io_pool_size(mut self, size: usize) -> Self {
        self.config.io_pool_size = size;
        self
    }

    /// Set the device completion mode
    pub fn completion_mode(mut self, mode: CompletionMode) -> Self {
        self.config.completion_mode = mode;
        self
    }

    /// Set the request pool size
    pub fn max_outstanding_requests(mut self, count: usize) -> Self {
        self.config.max_outstanding_requests = count;
        self
    }

    /// Set the per-channel wait queue depth
    pub fn max_queue_depth(mut self, depth: usize) -> Self {
        self.config.max_queue_depth = depth;
        self
    }

    /// Bound the number of resubmissions of a queued request
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = Some(retries);
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
