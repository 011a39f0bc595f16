//! The RESP server.

use crate::codec::{self, Reply};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use caskdb_core::{Database, OpenOption};
use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// A RESP-protocol TCP front-end over an exclusively held datastore.
///
/// The server opens the datastore read-write, accepts connections on
/// its listener, and serves each client from its own thread. Commands:
///
/// | Command | Engine call | Reply |
/// |---------|-------------|-------|
/// | `GET key` | `get` | bulk string |
/// | `SET key value` | `put` | `+OK` |
/// | `DEL key` | `delete` | `+OK` |
/// | `PING` | — | `+PONG` |
///
/// Engine and arity errors are relayed as `-ERR` replies; the
/// connection stays open.
pub struct RespServer {
    engine: Arc<Database>,
    listener: TcpListener,
}

impl RespServer {
    /// Opens the datastore and binds the listener.
    ///
    /// # Errors
    ///
    /// Returns datastore errors (including "access denied: datastore is
    /// locked") and I/O errors from binding.
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        let engine = Database::open(&config.datastore_dir, &[OpenOption::ReadWrite])?;
        let listener = TcpListener::bind(config.bind_addr)?;

        tracing::info!(
            datastore = %config.datastore_dir.display(),
            addr = %listener.local_addr()?,
            "server listening"
        );

        Ok(Self {
            engine: Arc::new(engine),
            listener,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and serves connections until the listener fails.
    pub fn serve(&self) -> ServerResult<()> {
        for stream in self.listener.incoming() {
            let stream = stream?;
            let engine = Arc::clone(&self.engine);

            thread::spawn(move || {
                if let Err(e) = handle_connection(stream, &engine) {
                    tracing::debug!(error = %e, "connection ended");
                }
            });
        }

        Ok(())
    }
}

fn handle_connection(stream: TcpStream, engine: &Database) -> ServerResult<()> {
    let peer = stream.peer_addr()?;
    tracing::debug!(%peer, "client connected");

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    while let Some(args) = codec::read_command(&mut reader)? {
        let reply = dispatch(engine, &args);
        codec::write_reply(&mut writer, &reply)?;
    }

    tracing::debug!(%peer, "client disconnected");

    Ok(())
}

fn dispatch(engine: &Database, args: &[String]) -> Reply {
    let Some(command) = args.first() else {
        return Reply::Error("empty command".to_owned());
    };

    match command.to_ascii_uppercase().as_str() {
        "GET" if args.len() == 2 => match engine.get(&args[1]) {
            Ok(value) => Reply::Bulk(value),
            Err(e) => Reply::Error(e.to_string()),
        },
        "SET" if args.len() == 3 => match engine.put(&args[1], &args[2]) {
            Ok(()) => Reply::Simple("OK".to_owned()),
            Err(e) => Reply::Error(e.to_string()),
        },
        "DEL" if args.len() == 2 => match engine.delete(&args[1]) {
            Ok(()) => Reply::Simple("OK".to_owned()),
            Err(e) => Reply::Error(e.to_string()),
        },
        "PING" if args.len() == 1 => Reply::Simple("PONG".to_owned()),
        "GET" | "SET" | "DEL" | "PING" => {
            Reply::Error("invalid number of arguments passed".to_owned())
        }
        other => Reply::Error(format!("unknown command '{other}'")),
    }
}
