//! Retry-wrapped file I/O.
//!
//! The on-disk protocol assumes whole-record appends and whole-record
//! positional reads. [`SafeFile`] absorbs short reads and short writes,
//! retrying with the unfilled remainder at the advanced offset, so
//! partial-I/O interruptions never leak to higher layers. Each logical
//! operation permits up to [`MAX_RETRIES`] retries before the
//! underlying error surfaces.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Retry budget for a single logical read or write.
pub const MAX_RETRIES: u32 = 5;

/// A file handle with retrying positional reads and appends.
#[derive(Debug)]
pub struct SafeFile {
    file: File,
}

impl SafeFile {
    /// Opens an existing file read-only.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Opens (or creates) a file in append mode.
    pub fn append_only(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        Ok(Self { file })
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// Short reads continue with the unfilled tail at the advanced
    /// offset; errors retry up to the budget. Reaching end-of-file
    /// before the buffer fills is an `UnexpectedEof` error.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let mut filled = 0;
        let mut retries = 0;

        while filled < buf.len() {
            match read_at_once(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "read past end of segment file",
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Appends the whole buffer, retrying the unwritten suffix.
    ///
    /// Returns the number of bytes written (always `buf.len()` on
    /// success).
    pub fn append(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        let mut retries = 0;

        while written < buf.len() {
            match self.file.write(&buf[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to make progress appending record",
                    ))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(e);
                    }
                }
            }
        }

        Ok(buf.len())
    }

    /// Forces all written data to durable storage (fsync).
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Returns the current size of the file in bytes.
    pub fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

#[cfg(unix)]
fn read_at_once(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at_once(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
