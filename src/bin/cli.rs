//! nvmkv CLI Client
//!
//! Command-line interface for an nvmkv server. Keys are given either as
//! `0x`-prefixed hex or as raw text.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nvmkv::key::{format_lower, parse_text};
use nvmkv::network::Client;
use nvmkv::protocol::StoreOptions;
use nvmkv::{Key, KvError, Result};

/// nvmkv CLI
#[derive(Parser, Debug)]
#[command(name = "nvmkv-cli")]
#[command(about = "CLI for the nvmkv key-value command set")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4420")]
    server: String,

    /// Namespace id
    #[arg(short, long, default_value = "1")]
    nsid: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a value
    Store {
        key: String,

        value: String,

        /// Fail if the key already exists
        #[arg(long, conflicts_with = "overwrite_only")]
        no_overwrite: bool,

        /// Fail if the key does not exist
        #[arg(long)]
        overwrite_only: bool,
    },

    /// Retrieve a value
    Retrieve {
        key: String,

        /// Host buffer size
        #[arg(short, long, default_value = "4096")]
        buffer: u32,
    },

    /// Delete a key
    Delete { key: String },

    /// Check whether a key exists
    Exist { key: String },

    /// List keys from a start key (inclusive)
    List {
        /// Start key, defaults to the smallest key
        start: Option<String>,

        /// Host buffer size
        #[arg(short, long, default_value = "4096")]
        buffer: u32,
    },
}

fn key_arg(s: &str) -> Result<Key> {
    parse_text(s)
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(args.server.as_str(), args.nsid)?;

    match args.command {
        Commands::Store {
            key,
            value,
            no_overwrite,
            overwrite_only,
        } => {
            let options = StoreOptions {
                no_overwrite,
                overwrite_only,
                ..StoreOptions::default()
            };
            client.store(&key_arg(&key)?, value.as_bytes(), options)?;
            println!("OK");
        }
        Commands::Retrieve { key, buffer } => {
            let (value_len, data) = client.retrieve(&key_arg(&key)?, buffer)?;
            println!("{}", String::from_utf8_lossy(&data));
            if value_len > data.len() {
                eprintln!("(truncated: {} of {} bytes)", data.len(), value_len);
            }
        }
        Commands::Delete { key } => {
            client.delete(&key_arg(&key)?)?;
            println!("OK");
        }
        Commands::Exist { key } => {
            let present = client.exist(&key_arg(&key)?)?;
            println!("{}", if present { "exists" } else { "not found" });
        }
        Commands::List { start, buffer } => {
            let start = match start {
                Some(s) => key_arg(&s)?,
                None => Key::MIN,
            };
            for key in client.list(&start, buffer)? {
                println!("{}", format_lower(&key));
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(KvError::KeyNotFound) => {
            eprintln!("not found");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
