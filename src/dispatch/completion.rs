//! Outcome to status mapping

use bytes::Bytes;

use crate::error::{ErrorClass, KvError, Result};
use crate::protocol::{Completion, Opcode, Status};

/// What a successfully executed request produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Store or delete
    Done,

    /// Full value length and the bytes that fit the host buffer
    Retrieved { value_len: usize, data: Bytes },

    /// Presence test result
    Exists(bool),

    /// Record count and the list buffer
    Listed { count: u32, data: Bytes },
}

/// Result of executing one request
pub type Outcome = Result<Output>;

/// Build the completion a request with `cid` reports for `outcome`
pub fn completion_for(cid: u16, opcode: Opcode, outcome: Outcome) -> Completion {
    match outcome {
        Ok(Output::Done) => Completion::new(cid, Status::Success),
        Ok(Output::Retrieved { value_len, data }) => Completion::new(cid, Status::Success)
            .with_cdw0(value_len as u32)
            .with_data(data),
        Ok(Output::Exists(true)) => Completion::new(cid, Status::Success),
        Ok(Output::Exists(false)) => Completion::new(cid, Status::KeyDoesNotExist),
        Ok(Output::Listed { count, data }) => Completion::new(cid, Status::Success)
            .with_cdw0(count)
            .with_data(data),
        Err(err) => {
            if err.class() == ErrorClass::Internal {
                tracing::warn!(cid, opcode = opcode.name(), error = %err, "command failed");
            } else {
                tracing::debug!(cid, opcode = opcode.name(), error = %err, "command rejected");
            }
            Completion::new(cid, Status::from_error(&err))
        }
    }
}

/// Error for a request the wait queue could not hold
pub(crate) fn queue_full(depth: usize) -> KvError {
    KvError::Internal(format!("wait queue full ({} requests)", depth))
}

/// Error for a request turned away more often than allowed
pub(crate) fn retries_exhausted(attempts: u32) -> KvError {
    KvError::Internal(format!("no IO resources after {} attempts", attempts))
}
