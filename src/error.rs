//! Error types for nvmkv
//!
//! Provides a unified error type for all operations, plus the coarse class
//! each error belongs to (what the dispatcher does with it).

use thiserror::Error;

use crate::protocol::Status;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for nvmkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key size: {0} bytes")]
    InvalidKeySize(usize),

    #[error("Invalid value size: {0} bytes")]
    InvalidValueSize(usize),

    #[error("Invalid key format: {0}")]
    InvalidFormat(String),

    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Unsupported opcode: 0x{0:02x}")]
    UnsupportedOpcode(u8),

    // -------------------------------------------------------------------------
    // State Errors
    // -------------------------------------------------------------------------
    #[error("Key exists")]
    KeyExists,

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Resource Errors
    // -------------------------------------------------------------------------
    #[error("Capacity exceeded: {used} of {capacity} in use, {requested} requested")]
    CapacityExceeded {
        used: u64,
        requested: u64,
        capacity: u64,
    },

    #[error("Resources exhausted: {0}")]
    ResourceExhausted(String),

    // -------------------------------------------------------------------------
    // Command Lifecycle
    // -------------------------------------------------------------------------
    #[error("Command aborted")]
    Aborted,

    // -------------------------------------------------------------------------
    // Internal Errors
    // -------------------------------------------------------------------------
    #[error("Unrecovered error: {0}")]
    Unrecovered(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // -------------------------------------------------------------------------
    // I/O and Transport Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Command failed with status {0:?}")]
    Status(Status),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// How an error is handled by the layers above the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any mutation, never retried
    Validation,

    /// Deterministic given current state, surfaced as-is
    State,

    /// Deterministic resource limit, caller must free space
    Resource,

    /// Allocator/pool exhaustion, absorbed by the dispatcher's retry queue
    Transient,

    /// Backend fault, surfaced as a generic device error
    Internal,
}

impl KvError {
    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            KvError::InvalidKeySize(_)
            | KvError::InvalidValueSize(_)
            | KvError::InvalidFormat(_)
            | KvError::BufferTooSmall { .. }
            | KvError::InvalidField(_)
            | KvError::UnsupportedOpcode(_)
            | KvError::Protocol(_)
            | KvError::Config(_) => ErrorClass::Validation,
            KvError::KeyExists | KvError::KeyNotFound | KvError::Aborted => ErrorClass::State,
            KvError::CapacityExceeded { .. } => ErrorClass::Resource,
            KvError::ResourceExhausted(_) => ErrorClass::Transient,
            KvError::Status(status) => match status {
                Status::InvalidOpcode
                | Status::InvalidField
                | Status::InvalidKeySize
                | Status::InvalidValueSize => ErrorClass::Validation,
                Status::KeyExists | Status::KeyDoesNotExist | Status::AbortRequested => {
                    ErrorClass::State
                }
                Status::CapacityExceeded => ErrorClass::Resource,
                Status::Success | Status::InternalDeviceError | Status::UnrecoveredError => {
                    ErrorClass::Internal
                }
            },
            KvError::Unrecovered(_) | KvError::Internal(_) | KvError::Io(_) => ErrorClass::Internal,
        }
    }
}
