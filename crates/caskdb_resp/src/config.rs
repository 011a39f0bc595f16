//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for the RESP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory of the datastore to serve.
    pub datastore_dir: PathBuf,
    /// Address to bind to.
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    /// Creates a server configuration.
    pub fn new(datastore_dir: impl Into<PathBuf>, bind_addr: SocketAddr) -> Self {
        Self {
            datastore_dir: datastore_dir.into(),
            bind_addr,
        }
    }
}
