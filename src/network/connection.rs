//! Connection Handler
//!
//! Handles individual client connections. Each connection owns one
//! dispatcher channel and executes one command at a time.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::dispatch::{Channel, Dispatcher};
use crate::error::{KvError, Result};
use crate::protocol::{read_command_frame, write_completion_frame, Completion, Status};
use crate::request::CompletionSink;

/// How long to wait for a completion before polling the backend
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    dispatcher: Arc<Dispatcher>,

    /// Submission channel owned by this connection
    channel: Arc<Channel>,

    completions: (Sender<Completion>, Receiver<Completion>),

    /// Peer address for logging
    peer_addr: String,
}

fn is_disconnect(err: &KvError) -> bool {
    matches!(
        err,
        KvError::Io(e) if matches!(
            e.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        )
    )
}

fn is_timeout(err: &KvError) -> bool {
    // Windows reports TimedOut instead of WouldBlock
    matches!(
        err,
        KvError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
    )
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and opens a channel on the dispatcher
    pub fn new(stream: TcpStream, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let channel = dispatcher.channel();

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            dispatcher,
            channel,
            completions: unbounded(),
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = none)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads command frames in a loop and writes one completion per frame.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, channel = self.channel.id(), "connection established");

        let result = self.serve();
        let dropped = self.channel.abort_all();
        if dropped > 0 {
            tracing::debug!(peer = %self.peer_addr, dropped, "aborted queued requests");
        }
        result
    }

    fn serve(&mut self) -> Result<()> {
        loop {
            let frame = match read_command_frame(&mut self.reader) {
                Ok(frame) => frame,
                Err(ref e) if is_disconnect(e) => {
                    tracing::debug!(peer = %self.peer_addr, "client disconnected");
                    return Ok(());
                }
                Err(ref e) if is_timeout(e) => {
                    tracing::debug!(peer = %self.peer_addr, "read timeout");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "error reading frame");
                    return Err(e);
                }
            };

            let completion = match frame.command() {
                Ok(cmd) => {
                    tracing::trace!(peer = %self.peer_addr, cid = cmd.cid, opcode = cmd.opcode.name(), "command");
                    let sink = CompletionSink::from_sender(self.completions.0.clone());
                    match self.dispatcher.requests().from_command(&cmd, frame.payload, sink) {
                        Ok(request) => {
                            self.channel.submit(request);
                            self.wait_completion()?
                        }
                        Err(e) => Completion::new(cmd.cid, Status::from_error(&e)),
                    }
                }
                Err(e) => {
                    tracing::debug!(peer = %self.peer_addr, error = %e, "undecodable command");
                    Completion::new(frame.cid(), Status::from_error(&e))
                }
            };

            if let Err(e) = write_completion_frame(&mut self.writer, &completion) {
                if is_disconnect(&e) {
                    tracing::debug!(peer = %self.peer_addr, "client gone before completion was sent");
                    return Ok(());
                }
                tracing::warn!(peer = %self.peer_addr, error = %e, "error writing completion");
                return Err(e);
            }
        }
    }

    /// Wait for the in-flight command, polling the backend for deferred IOs
    fn wait_completion(&self) -> Result<Completion> {
        loop {
            match self.completions.1.recv_timeout(POLL_INTERVAL) {
                Ok(completion) => return Ok(completion),
                Err(RecvTimeoutError::Timeout) => {
                    self.dispatcher.poll();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(KvError::Internal("completion channel closed".to_string()));
                }
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
