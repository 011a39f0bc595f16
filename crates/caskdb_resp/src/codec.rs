//! Minimal RESP (REdis Serialization Protocol) codec.
//!
//! ## Wire Format
//!
//! ### Requests
//!
//! Clients send commands as RESP arrays of bulk strings:
//!
//! ```text
//! *3\r\n$3\r\nSET\r\n$5\r\nhello\r\n$5\r\nworld\r\n
//! ```
//!
//! ### Replies
//!
//! ```text
//! +OK\r\n              simple string
//! $5\r\nvalue\r\n      bulk string
//! -ERR message\r\n     error
//! ```

use crate::error::{ServerError, ServerResult};
use std::io::{self, BufRead, Write};

/// Maximum number of arguments accepted in one command.
pub const MAX_ARGS: usize = 64;

/// Maximum size of a single bulk string (16 MB).
pub const MAX_BULK_LEN: usize = 16 * 1024 * 1024;

/// A reply to send back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A `+...` simple string, e.g. `OK`.
    Simple(String),
    /// A `$<len>` bulk string carrying a value.
    Bulk(String),
    /// A `-ERR ...` error.
    Error(String),
}

/// Reads one command (an array of bulk strings) from `reader`.
///
/// Returns `Ok(None)` when the client closed the connection at a
/// command boundary.
///
/// # Errors
///
/// Returns a protocol error on malformed input and I/O errors from the
/// stream.
pub fn read_command<R: BufRead>(reader: &mut R) -> ServerResult<Option<Vec<String>>> {
    let mut header = String::new();
    if reader.read_line(&mut header)? == 0 {
        return Ok(None);
    }

    let argc: usize = header
        .trim_end()
        .strip_prefix('*')
        .ok_or_else(|| ServerError::protocol("expected array header"))?
        .parse()
        .map_err(|_| ServerError::protocol("invalid array length"))?;
    if argc > MAX_ARGS {
        return Err(ServerError::protocol("too many arguments"));
    }

    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        args.push(read_bulk_string(reader)?);
    }

    Ok(Some(args))
}

fn read_bulk_string<R: BufRead>(reader: &mut R) -> ServerResult<String> {
    let mut header = String::new();
    if reader.read_line(&mut header)? == 0 {
        return Err(ServerError::protocol("unexpected end of stream"));
    }

    let len: usize = header
        .trim_end()
        .strip_prefix('$')
        .ok_or_else(|| ServerError::protocol("expected bulk string header"))?
        .parse()
        .map_err(|_| ServerError::protocol("invalid bulk string length"))?;
    if len > MAX_BULK_LEN {
        return Err(ServerError::protocol("bulk string too large"));
    }

    // Payload plus the trailing CRLF.
    let mut buf = vec![0u8; len + 2];
    reader.read_exact(&mut buf)?;

    let arg = std::str::from_utf8(&buf[..len])
        .map_err(|_| ServerError::protocol("argument is not valid UTF-8"))?;

    Ok(arg.to_owned())
}

/// Writes `reply` to `writer` and flushes it.
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> io::Result<()> {
    match reply {
        Reply::Simple(s) => write!(writer, "+{s}\r\n")?,
        Reply::Bulk(s) => write!(writer, "${}\r\n{s}\r\n", s.len())?,
        Reply::Error(message) => {
            // Keep the error on a single protocol line.
            let message = message.replace(['\r', '\n'], " ");
            write!(writer, "-ERR {message}\r\n")?;
        }
    }

    writer.flush()
}
