//! Network Module
//!
//! TCP transport for the KV command set.
//!
//! ## Components
//! - `Server`: accepts connections, one thread per client
//! - `Connection`: one client, one dispatcher channel
//! - `Client`: blocking client over the same framing

mod server;
mod connection;
mod client;

pub use server::{Server, ShutdownHandle};
pub use connection::Connection;
pub use client::Client;
