//! nvmkv Server Binary
//!
//! Starts an in-memory KV namespace behind the TCP transport.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use nvmkv::config::{CompletionMode, Footprint};
use nvmkv::device::MemoryDevice;
use nvmkv::network::Server;
use nvmkv::store::MemoryEngine;
use nvmkv::{Config, Dispatcher};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FootprintArg {
    /// Charge key length only
    Key,
    /// Charge key plus value length
    KeyValue,
    /// Charge one unit per entry
    Entries,
}

impl From<FootprintArg> for Footprint {
    fn from(arg: FootprintArg) -> Self {
        match arg {
            FootprintArg::Key => Footprint::KeyBytes,
            FootprintArg::KeyValue => Footprint::KeyAndValueBytes,
            FootprintArg::Entries => Footprint::Entries,
        }
    }
}

/// nvmkv Server
#[derive(Parser, Debug)]
#[command(name = "nvmkv-server")]
#[command(about = "Key-value command set server with an in-memory namespace")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4420")]
    listen: String,

    /// Namespace id
    #[arg(short, long, default_value = "1")]
    nsid: u32,

    /// Engine capacity in footprint units
    #[arg(short, long, default_value = "67108864")]
    capacity: u64,

    /// What each entry charges against the capacity
    #[arg(short, long, value_enum, default_value = "key")]
    footprint: FootprintArg,

    /// Largest accepted value in bytes
    #[arg(long, default_value = "1048576")]
    max_value_len: usize,

    /// Maximum number of keys (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_keys: u32,

    /// Device IO slots
    #[arg(long, default_value = "128")]
    io_pool: usize,

    /// Complete IOs when polled instead of inside submit
    #[arg(long)]
    deferred: bool,

    /// Maximum live requests
    #[arg(long, default_value = "1024")]
    max_requests: usize,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nvmkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("nvmkv server v{}", nvmkv::VERSION);

    let mode = if args.deferred {
        CompletionMode::Deferred
    } else {
        CompletionMode::Inline
    };
    let config = Config::builder()
        .listen_addr(&args.listen)
        .namespace_id(args.nsid)
        .max_value_len(args.max_value_len)
        .max_num_keys(args.max_keys)
        .capacity(args.capacity)
        .footprint(args.footprint.into())
        .io_pool_size(args.io_pool)
        .completion_mode(mode)
        .max_outstanding_requests(args.max_requests)
        .max_connections(args.max_connections)
        .build();

    let engine = Arc::new(MemoryEngine::new(
        config.namespace,
        config.capacity,
        config.footprint,
    ));
    let device = Arc::new(MemoryDevice::new(
        format!("mem{}", config.namespace.id),
        engine,
        config.io_pool_size,
        config.completion_mode,
    ));

    let dispatcher = match Dispatcher::new(config.clone(), device) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            tracing::error!("Failed to start dispatcher: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, Arc::clone(&dispatcher)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        dispatcher.shutdown();
        std::process::exit(1);
    }

    dispatcher.shutdown();
}
