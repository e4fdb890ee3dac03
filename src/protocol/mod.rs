//! Protocol Module
//!
//! The KV command set wire formats.
//!
//! ## Command Format (64 bytes, little-endian)
//! ```text
//! ┌────────┬─────────┬─────┬──────┬──────────┬──────┬──────────┬───────┬───────┬───────┬───────┬──────────┐
//! │ Opc(1) │ Flags(1)│Cid 2│Nsid 4│ Key[0:8] │Mptr 8│ Dptr 16  │cdw10 4│cdw11 4│cdw12 4│cdw13 4│ Key[8:16]│
//! └────────┴─────────┴─────┴──────┴──────────┴──────┴──────────┴───────┴───────┴───────┴───────┴──────────┘
//! ```
//!
//! ### Opcodes
//! - 0x01: STORE    - cdw10 = value size, cdw11 = key len | store options << 8
//! - 0x02: RETRIEVE - cdw10 = host buffer size, cdw11 = key len | retrieve options << 8
//! - 0x06: LIST     - cdw10 = host buffer size, cdw11 = key len (start key)
//! - 0x10: DELETE   - cdw11 = key len
//! - 0x14: EXIST    - cdw11 = key len
//!
//! ### Completion Format (16 bytes)
//! ```text
//! ┌────────┬────────┬──────────┬────────┬────────┬──────────────────────────────┐
//! │ dw0 4  │ dw1 4  │ SQ head 2│ SQ id 2│ Cid 2  │ Status 2 (P | SC | SCT | DNR)│
//! └────────┴────────┴──────────┴────────┴────────┴──────────────────────────────┘
//! ```
//!
//! ### List Buffer
//! `u32` record count, then records of `u16 key_len` + key bytes, each padded
//! to a 4-byte boundary.

mod command;
mod response;
mod codec;
mod list;

pub use command::{DataPointer, KvCommand, Opcode, RetrieveOptions, StoreOptions};
pub use response::{Completion, Status, StatusCodeType};
pub use codec::{
    decode_command, decode_completion, encode_command, encode_completion, peek_cid,
    read_command_frame, read_completion_frame, write_command_frame, write_completion_frame,
    CommandFrame, COMMAND_SIZE, COMPLETION_SIZE, MAX_PAYLOAD_SIZE,
};
pub use list::{decode_list, record_size, ListWriter, LIST_HEADER_SIZE};
