//! Response definitions
//!
//! Two-tier completion status and the completion handed back to callers.

use bytes::Bytes;

use crate::error::KvError;

/// Status code type (SCT)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCodeType {
    Generic = 0x0,
    CommandSpecific = 0x1,
}

/// Completion status: one status code type plus one status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Generic
    Success,
    InvalidOpcode,
    InvalidField,
    InternalDeviceError,
    AbortRequested,

    // Command specific
    CapacityExceeded,
    InvalidValueSize,
    InvalidKeySize,
    KeyDoesNotExist,
    UnrecoveredError,
    KeyExists,
}

impl Status {
    pub fn code_type(&self) -> StatusCodeType {
        match self {
            Status::Success
            | Status::InvalidOpcode
            | Status::InvalidField
            | Status::InternalDeviceError
            | Status::AbortRequested => StatusCodeType::Generic,
            _ => StatusCodeType::CommandSpecific,
        }
    }

    /// Status code (SC)
    pub fn code(&self) -> u8 {
        match self {
            Status::Success => 0x00,
            Status::InvalidOpcode => 0x01,
            Status::InvalidField => 0x02,
            Status::InternalDeviceError => 0x06,
            Status::AbortRequested => 0x07,
            Status::CapacityExceeded => 0x81,
            Status::InvalidValueSize => 0x85,
            Status::InvalidKeySize => 0x86,
            Status::KeyDoesNotExist => 0x87,
            Status::UnrecoveredError => 0x88,
            Status::KeyExists => 0x89,
        }
    }

    /// Look up a status by its (SCT, SC) pair
    pub fn from_parts(code_type: u8, code: u8) -> Option<Status> {
        let status = match (code_type, code) {
            (0x0, 0x00) => Status::Success,
            (0x0, 0x01) => Status::InvalidOpcode,
            (0x0, 0x02) => Status::InvalidField,
            (0x0, 0x06) => Status::InternalDeviceError,
            (0x0, 0x07) => Status::AbortRequested,
            (0x1, 0x81) => Status::CapacityExceeded,
            (0x1, 0x85) => Status::InvalidValueSize,
            (0x1, 0x86) => Status::InvalidKeySize,
            (0x1, 0x87) => Status::KeyDoesNotExist,
            (0x1, 0x88) => Status::UnrecoveredError,
            (0x1, 0x89) => Status::KeyExists,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_success(&self) -> bool {
        *self == Status::Success
    }

    /// Map an error to the status a completion reports for it
    pub fn from_error(err: &KvError) -> Status {
        match err {
            KvError::InvalidKeySize(_) => Status::InvalidKeySize,
            KvError::InvalidValueSize(_) => Status::InvalidValueSize,
            KvError::InvalidFormat(_)
            | KvError::BufferTooSmall { .. }
            | KvError::InvalidField(_)
            | KvError::Protocol(_)
            | KvError::Config(_) => Status::InvalidField,
            KvError::UnsupportedOpcode(_) => Status::InvalidOpcode,
            KvError::KeyExists => Status::KeyExists,
            KvError::KeyNotFound => Status::KeyDoesNotExist,
            KvError::CapacityExceeded { .. } => Status::CapacityExceeded,
            KvError::Aborted => Status::AbortRequested,
            KvError::Unrecovered(_) => Status::UnrecoveredError,
            KvError::Status(status) => *status,
            KvError::ResourceExhausted(_) | KvError::Internal(_) | KvError::Io(_) => {
                Status::InternalDeviceError
            }
        }
    }
}

/// A finished command as seen by its submitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Command identifier of the request
    pub cid: u16,

    pub status: Status,

    /// Full value length (retrieve) or record count (list), else 0
    pub cdw0: u32,

    /// Retrieved bytes or the list buffer
    pub data: Option<Bytes>,
}

impl Completion {
    pub fn new(cid: u16, status: Status) -> Self {
        Self {
            cid,
            status,
            cdw0: 0,
            data: None,
        }
    }

    pub fn with_cdw0(mut self, cdw0: u32) -> Self {
        self.cdw0 = cdw0;
        self
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
