//! Client
//!
//! Blocking client speaking the framed command protocol.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::Bytes;

use crate::error::{KvError, Result};
use crate::key::Key;
use crate::protocol::{
    decode_list, read_completion_frame, write_command_frame, Completion, KvCommand,
    RetrieveOptions, Status, StoreOptions,
};

/// A connection to an nvmkv server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    nsid: u32,
    next_cid: u16,
}

impl Client {
    /// Connect to `addr`, addressing namespace `nsid`
    pub fn connect(addr: impl ToSocketAddrs, nsid: u32) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            nsid,
            next_cid: 0,
        })
    }

    /// Store `value` under `key`
    pub fn store(&mut self, key: &Key, value: &[u8], options: StoreOptions) -> Result<()> {
        let cid = self.cid();
        let cmd = KvCommand::store(cid, self.nsid, key, value.len() as u32, options);
        self.execute(&cmd, value).map(|_| ())
    }

    /// Retrieve up to `buffer_len` bytes of the value under `key`
    ///
    /// Returns the full value length alongside the bytes received.
    pub fn retrieve(&mut self, key: &Key, buffer_len: u32) -> Result<(usize, Bytes)> {
        let cid = self.cid();
        let cmd = KvCommand::retrieve(cid, self.nsid, key, buffer_len, RetrieveOptions::default());
        let completion = self.execute(&cmd, &[])?;
        Ok((completion.cdw0 as usize, completion.data.unwrap_or_default()))
    }

    pub fn delete(&mut self, key: &Key) -> Result<()> {
        let cid = self.cid();
        let cmd = KvCommand::delete(cid, self.nsid, key);
        self.execute(&cmd, &[]).map(|_| ())
    }

    pub fn exist(&mut self, key: &Key) -> Result<bool> {
        let cid = self.cid();
        let cmd = KvCommand::exist(cid, self.nsid, key);
        match self.execute(&cmd, &[]) {
            Ok(_) => Ok(true),
            Err(KvError::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List keys `>= start` that fit a buffer of `buffer_len` bytes
    pub fn list(&mut self, start: &Key, buffer_len: u32) -> Result<Vec<Key>> {
        let cid = self.cid();
        let cmd = KvCommand::list(cid, self.nsid, start, buffer_len);
        let completion = self.execute(&cmd, &[])?;
        decode_list(completion.data.as_deref().unwrap_or(&[]))
    }

    /// Send a raw command and wait for its completion
    pub fn execute(&mut self, cmd: &KvCommand, payload: &[u8]) -> Result<Completion> {
        write_command_frame(&mut self.writer, cmd, payload)?;
        let completion = read_completion_frame(&mut self.reader)?;

        if completion.cid != cmd.cid {
            return Err(KvError::Protocol(format!(
                "completion for cid {} while waiting for {}",
                completion.cid, cmd.cid
            )));
        }
        if !completion.is_success() {
            return Err(status_error(completion.status));
        }
        Ok(completion)
    }

    fn cid(&mut self) -> u16 {
        let cid = self.next_cid;
        self.next_cid = self.next_cid.wrapping_add(1);
        cid
    }
}

/// Turn a failed completion status back into an error
fn status_error(status: Status) -> KvError {
    match status {
        Status::KeyExists => KvError::KeyExists,
        Status::KeyDoesNotExist => KvError::KeyNotFound,
        Status::AbortRequested => KvError::Aborted,
        other => KvError::Status(other),
    }
}
