//! Protocol codec
//!
//! Encoding and decoding functions for the 64-byte command, the 16-byte
//! completion entry, and the framed stream transport built on them.
//!
//! ## Stream Framing
//!
//! ### Request Frame
//! ```text
//! ┌──────────────────┬──────────┬─────────────────────────────┐
//! │  Command (64)    │ Len (4)  │   Payload (store value)     │
//! └──────────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Response Frame
//! ```text
//! ┌──────────────────┬──────────┬─────────────────────────────┐
//! │ Completion (16)  │ Len (4)  │ Payload (value / list buf)  │
//! └──────────────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{KvError, Result};
use super::{Completion, DataPointer, KvCommand, Opcode, Status};

/// Size of an encoded command
pub const COMMAND_SIZE: usize = 64;

/// Size of an encoded completion entry
pub const COMPLETION_SIZE: usize = 16;

/// Maximum frame payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

const FUSE_MASK: u8 = 0x03;
const PSDT_SHIFT: u8 = 6;

const STATUS_PHASE: u16 = 1 << 0;
const STATUS_SC_SHIFT: u16 = 1;
const STATUS_SCT_SHIFT: u16 = 9;
const STATUS_SCT_MASK: u16 = 0x7;
const STATUS_DNR: u16 = 1 << 15;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command into its 64-byte wire form
pub fn encode_command(cmd: &KvCommand) -> [u8; COMMAND_SIZE] {
    let mut out = [0u8; COMMAND_SIZE];
    let mut buf = &mut out[..];

    buf.put_u8(cmd.opcode as u8);
    buf.put_u8((cmd.fuse & FUSE_MASK) | (cmd.psdt << PSDT_SHIFT));
    buf.put_u16_le(cmd.cid);
    buf.put_u32_le(cmd.nsid);
    buf.put_u32_le(cmd.key_dwords[0]);
    buf.put_u32_le(cmd.key_dwords[1]);
    buf.put_u64_le(cmd.mptr);
    match cmd.dptr {
        DataPointer::Prp { prp1, prp2 } => {
            buf.put_u64_le(prp1);
            buf.put_u64_le(prp2);
        }
        DataPointer::Sgl(descriptor) => buf.put_slice(&descriptor),
    }
    buf.put_u32_le(cmd.cdw10);
    buf.put_u32_le(cmd.cdw11);
    buf.put_u32_le(cmd.cdw12);
    buf.put_u32_le(cmd.cdw13);
    buf.put_u32_le(cmd.key_dwords[2]);
    buf.put_u32_le(cmd.key_dwords[3]);

    out
}

/// Decode a 64-byte command
///
/// Unknown opcodes fail `UnsupportedOpcode`; the key is not validated here.
pub fn decode_command(bytes: &[u8]) -> Result<KvCommand> {
    if bytes.len() < COMMAND_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete command: expected {} bytes, got {}",
            COMMAND_SIZE,
            bytes.len()
        )));
    }

    let mut buf = &bytes[..COMMAND_SIZE];
    let opcode = Opcode::try_from(buf.get_u8())?;
    let flags = buf.get_u8();
    let cid = buf.get_u16_le();
    let nsid = buf.get_u32_le();
    let key_lo = [buf.get_u32_le(), buf.get_u32_le()];
    let mptr = buf.get_u64_le();

    let psdt = flags >> PSDT_SHIFT;
    let dptr = if psdt == 0 {
        DataPointer::Prp {
            prp1: buf.get_u64_le(),
            prp2: buf.get_u64_le(),
        }
    } else {
        let mut descriptor = [0u8; 16];
        buf.copy_to_slice(&mut descriptor);
        DataPointer::Sgl(descriptor)
    };

    let cdw10 = buf.get_u32_le();
    let cdw11 = buf.get_u32_le();
    let cdw12 = buf.get_u32_le();
    let cdw13 = buf.get_u32_le();
    let key_hi = [buf.get_u32_le(), buf.get_u32_le()];

    Ok(KvCommand {
        opcode,
        fuse: flags & FUSE_MASK,
        psdt,
        cid,
        nsid,
        key_dwords: [key_lo[0], key_lo[1], key_hi[0], key_hi[1]],
        mptr,
        dptr,
        cdw10,
        cdw11,
        cdw12,
        cdw13,
    })
}

/// Read the command id out of raw command bytes, even if the rest is invalid
pub fn peek_cid(bytes: &[u8]) -> Option<u16> {
    bytes.get(2..4).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

// =============================================================================
// Completion Encoding/Decoding
// =============================================================================

/// Encode the 16-byte completion entry (payload travels separately)
pub fn encode_completion(completion: &Completion) -> [u8; COMPLETION_SIZE] {
    let status = completion.status;
    let mut word = ((status.code() as u16) << STATUS_SC_SHIFT)
        | ((status.code_type() as u16) << STATUS_SCT_SHIFT)
        | STATUS_PHASE;
    if !status.is_success() {
        word |= STATUS_DNR;
    }

    let mut out = [0u8; COMPLETION_SIZE];
    let mut buf = &mut out[..];
    buf.put_u32_le(completion.cdw0);
    buf.put_u32_le(0); // dw1
    buf.put_u16_le(0); // sq head
    buf.put_u16_le(0); // sq id
    buf.put_u16_le(completion.cid);
    buf.put_u16_le(word);

    out
}

/// Decode a 16-byte completion entry
pub fn decode_completion(bytes: &[u8]) -> Result<Completion> {
    if bytes.len() < COMPLETION_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete completion: expected {} bytes, got {}",
            COMPLETION_SIZE,
            bytes.len()
        )));
    }

    let mut buf = &bytes[..COMPLETION_SIZE];
    let cdw0 = buf.get_u32_le();
    buf.advance(8); // dw1, sq head, sq id
    let cid = buf.get_u16_le();
    let word = buf.get_u16_le();

    let code = (word >> STATUS_SC_SHIFT) as u8;
    let code_type = ((word >> STATUS_SCT_SHIFT) & STATUS_SCT_MASK) as u8;
    let status = Status::from_parts(code_type, code).ok_or_else(|| {
        KvError::Protocol(format!(
            "Unknown status: sct 0x{:x} sc 0x{:02x}",
            code_type, code
        ))
    })?;

    Ok(Completion::new(cid, status).with_cdw0(cdw0))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// A command frame as read off the wire, before the command is decoded
#[derive(Debug, Clone)]
pub struct CommandFrame {
    pub raw: [u8; COMMAND_SIZE],
    pub payload: Bytes,
}

impl CommandFrame {
    pub fn command(&self) -> Result<KvCommand> {
        decode_command(&self.raw)
    }

    pub fn cid(&self) -> u16 {
        u16::from_le_bytes([self.raw[2], self.raw[3]])
    }
}

fn read_payload<R: Read>(reader: &mut R) -> Result<Bytes> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes);

    if len > MAX_PAYLOAD_SIZE {
        return Err(KvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut payload = BytesMut::zeroed(len as usize);
    if len > 0 {
        reader.read_exact(&mut payload)?;
    }
    Ok(payload.freeze())
}

fn write_payload<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(KvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Read a complete command frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_command_frame<R: Read>(reader: &mut R) -> Result<CommandFrame> {
    let mut raw = [0u8; COMMAND_SIZE];
    reader.read_exact(&mut raw)?;
    let payload = read_payload(reader)?;
    Ok(CommandFrame { raw, payload })
}

/// Write a command and its payload to a stream
pub fn write_command_frame<W: Write>(
    writer: &mut W,
    cmd: &KvCommand,
    payload: &[u8],
) -> Result<()> {
    writer.write_all(&encode_command(cmd))?;
    write_payload(writer, payload)?;
    writer.flush()?;
    Ok(())
}

/// Read a completion and its payload from a stream
pub fn read_completion_frame<R: Read>(reader: &mut R) -> Result<Completion> {
    let mut raw = [0u8; COMPLETION_SIZE];
    reader.read_exact(&mut raw)?;
    let completion = decode_completion(&raw)?;
    let payload = read_payload(reader)?;

    if payload.is_empty() {
        Ok(completion)
    } else {
        Ok(completion.with_data(payload))
    }
}

/// Write a completion and its payload to a stream
pub fn write_completion_frame<W: Write>(writer: &mut W, completion: &Completion) -> Result<()> {
    writer.write_all(&encode_completion(completion))?;
    write_payload(writer, completion.data.as_deref().unwrap_or(&[]))?;
    writer.flush()?;
    Ok(())
}
