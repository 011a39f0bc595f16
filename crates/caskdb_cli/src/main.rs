//! CaskDB server binary.
//!
//! Serves a CaskDB datastore over the RESP protocol:
//!
//! ```text
//! caskdb-server -d ./datastore -p 6379
//! ```
//!
//! Exits 0 on clean shutdown and 1 on a startup or serve error.

use caskdb_resp::{RespServer, ServerConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// RESP front-end for a CaskDB datastore.
#[derive(Parser)]
#[command(name = "caskdb-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the datastore directory
    #[arg(short = 'd', long = "datastore")]
    datastore: PathBuf,

    /// TCP port to listen on
    #[arg(short = 'p', long = "port", default_value_t = 6379)]
    port: u16,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let server = RespServer::bind(ServerConfig::new(cli.datastore, addr))?;
    server.serve()?;

    Ok(())
}
