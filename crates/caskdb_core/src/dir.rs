//! Datastore directory management and locking.
//!
//! Layout of `<datastore>/`:
//!
//! ```text
//! <datastore>/
//! ├─ .lck            # advisory-lock sentinel
//! ├─ <stamp>.data    # data segments (the newest receives appends)
//! ├─ <stamp>.hint    # hint files paired with merge-produced segments
//! └─ keydir          # optional key-directory snapshot (shared readers)
//! ```
//!
//! The `.lck` file carries an advisory lock: exclusive for the single
//! writer, shared for readers. Locks are taken non-blocking; an open
//! that cannot acquire its lock fails immediately. The file's presence
//! does not indicate liveness.

use crate::error::{CaskError, CaskResult};
use crate::log::data_file_name;
use crate::record::{self, DATA_HEADER_SIZE};
use crate::sio::SafeFile;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Advisory-lock sentinel inside the datastore directory.
const LOCK_FILE: &str = ".lck";

/// Sentinel value appended for logical deletes: the SHA-256 digest
/// (hex) of the string `"deleted value"`.
///
/// A record carrying this value is reported as "key does not exist".
/// The flip side is that a user value equal to the sentinel cannot be
/// stored; storing it acts as a delete.
pub const TOMBSTONE: &str = "8890fc70294d02dbde257989e802451c2276be7fb177c3ca4399dc4728e4e1e0";

/// Lock flavor taken on the datastore directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Single writer; excludes every other handle.
    Exclusive,
    /// Concurrent readers; excludes writers.
    Shared,
}

/// An open datastore directory, holding its advisory lock.
///
/// The lock is released when the `Datastore` is dropped.
#[derive(Debug)]
pub struct Datastore {
    path: PathBuf,
    lock_file: File,
}

impl Datastore {
    /// Opens a datastore directory and acquires its lock.
    ///
    /// A missing directory is created when `mode` is
    /// [`LockMode::Exclusive`]; opening a missing directory in
    /// [`LockMode::Shared`] propagates the underlying not-found error.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::DatastoreLocked`] if another handle holds
    /// an incompatible lock, and I/O errors otherwise.
    pub fn open(path: &Path, mode: LockMode) -> CaskResult<Self> {
        if !path.is_dir() {
            match mode {
                LockMode::Exclusive => fs::create_dir_all(path)?,
                LockMode::Shared => {
                    fs::read_dir(path)?;
                }
            }
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        // Non-blocking acquisition only; the engine never waits.
        let acquired = match mode {
            LockMode::Exclusive => FileExt::try_lock_exclusive(&lock_file),
            LockMode::Shared => FileExt::try_lock_shared(&lock_file),
        };
        if acquired.is_err() {
            return Err(CaskError::DatastoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file,
        })
    }

    /// Returns the path to the datastore directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the value of the record at `value_pos` in segment
    /// `file_id`, verifying its checksum.
    ///
    /// Reads exactly `18 + key size + value size` bytes. A record whose
    /// value is the tombstone sentinel is reported as
    /// [`CaskError::KeyNotFound`].
    pub fn read_value(
        &self,
        file_id: u64,
        key: &str,
        value_pos: u32,
        value_size: u32,
    ) -> CaskResult<String> {
        let len = DATA_HEADER_SIZE + key.len() + value_size as usize;
        let mut buf = vec![0u8; len];

        let file = SafeFile::open(&self.path.join(data_file_name(file_id)))?;
        file.read_at(&mut buf, u64::from(value_pos))?;

        let (rec, _) = record::decode_data(&buf)?;
        if rec.value == TOMBSTONE {
            return Err(CaskError::key_not_found(rec.key));
        }

        Ok(rec.value)
    }
}

impl Drop for Datastore {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.lock_file);
    }
}
