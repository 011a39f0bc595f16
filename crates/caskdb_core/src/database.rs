//! Engine façade.

use crate::config::{OpenOption, Options};
use crate::dir::{Datastore, LockMode, TOMBSTONE};
use crate::error::{CaskError, CaskResult};
use crate::keydir::{KeyDir, KEYDIR_FILE};
use crate::log::{data_file_name, now_micros, AppendLog, LogKind, DATA_EXT, HINT_EXT};
use crate::record::KeyDirEntry;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};

/// The main datastore handle.
///
/// `Database` ties the segment log, the key directory, and the
/// directory lock into the public API. A handle may be shared across
/// threads: lookups take the read side of the key-directory lock,
/// mutations the write side, and appends serialize on the active
/// segment.
///
/// # Opening a datastore
///
/// ```rust,ignore
/// use caskdb_core::{Database, OpenOption};
///
/// let db = Database::open("my_store", &[OpenOption::ReadWrite])?;
/// db.put("greeting", "hello")?;
/// assert_eq!(db.get("greeting")?, "hello");
/// db.close()?;
/// ```
///
/// Only one read-write handle may hold a datastore at a time; any
/// number of read-only processes may share one, but not alongside a
/// writer. Read-only handles see the state as of their `open` and do
/// not refresh mid-session.
///
/// # Tombstones
///
/// Deletion appends a sentinel record ([`TOMBSTONE`]) rather than
/// erasing anything; space is reclaimed by [`merge`](Self::merge). A
/// user value equal to the sentinel cannot be stored; storing it acts
/// as a delete.
#[derive(Debug)]
pub struct Database {
    datastore: Datastore,
    options: Options,
    keydir: RwLock<KeyDir>,
    active: Mutex<AppendLog>,
}

impl Database {
    /// Opens the datastore at `path`.
    ///
    /// Recognized options are [`OpenOption::ReadOnly`],
    /// [`OpenOption::ReadWrite`], [`OpenOption::SyncOnPut`] and
    /// [`OpenOption::SyncOnDemand`]; the defaults are read-only and
    /// sync-on-demand. A missing datastore directory is created under
    /// `ReadWrite` and is an error under `ReadOnly`. Read-only handles
    /// persist the freshly built key directory as the `keydir`
    /// snapshot so concurrent readers can skip the rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::DatastoreLocked`] when an incompatible
    /// handle holds the datastore, the underlying not-found error when
    /// opening a missing directory read-only, and I/O or corruption
    /// errors from reconstructing the key directory.
    pub fn open(path: impl AsRef<Path>, opts: &[OpenOption]) -> CaskResult<Self> {
        let path = path.as_ref();
        let options = Options::parse(opts);

        let lock_mode = if options.is_writable() {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        };

        let datastore = Datastore::open(path, lock_mode)?;
        let keydir = KeyDir::load(path, !options.is_writable())?;
        let active = AppendLog::new(path, LogKind::Active, options.sync_on_put());

        tracing::info!(
            path = %path.display(),
            keys = keydir.len(),
            writable = options.is_writable(),
            "opened datastore"
        );

        Ok(Self {
            datastore,
            options,
            keydir: RwLock::new(keydir),
            active: Mutex::new(active),
        })
    }

    /// Retrieves the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::KeyNotFound`] when the key is absent or
    /// tombstoned, and corruption or I/O errors from reading the
    /// record.
    pub fn get(&self, key: &str) -> CaskResult<String> {
        let entry = match self.keydir.read().get(key) {
            Some(entry) => *entry,
            None => return Err(CaskError::key_not_found(key)),
        };

        self.datastore
            .read_value(entry.file_id, key, entry.value_pos, entry.value_size)
    }

    /// Stores `value` under `key`.
    ///
    /// The record is appended to the active segment and the key
    /// directory is updated to point at it. Durability follows the
    /// handle's sync policy.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::WritePermission`] on a read-only handle,
    /// and I/O errors from the append.
    pub fn put(&self, key: &str, value: &str) -> CaskResult<()> {
        self.require_write("put")?;

        let tstamp = now_micros();
        let (file_id, value_pos) = {
            let mut active = self.active.lock();
            let pos = active.append(key, value, tstamp)?;
            (active.file_id(), pos)
        };

        let mut keydir = self.keydir.write();
        if value == TOMBSTONE {
            keydir.remove(key);
        } else {
            keydir.insert(
                key.to_owned(),
                KeyDirEntry {
                    file_id,
                    value_pos,
                    value_size: value.len() as u32,
                    tstamp,
                },
            );
        }

        Ok(())
    }

    /// Removes `key` by appending a tombstone record.
    ///
    /// Space is reclaimed by the next [`merge`](Self::merge).
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::WritePermission`] on a read-only handle,
    /// [`CaskError::KeyNotFound`] when the key does not exist, and I/O
    /// errors from the tombstone append.
    pub fn delete(&self, key: &str) -> CaskResult<()> {
        self.require_write("delete")?;

        self.get(key)?;
        self.put(key, TOMBSTONE)
    }

    /// Lists all live keys, in unspecified order.
    #[must_use]
    pub fn list_keys(&self) -> Vec<String> {
        self.keydir.read().keys().cloned().collect()
    }

    /// Folds `f` over all live key/value pairs.
    ///
    /// The key set is snapshotted up front; values are then read
    /// outside the index lock. A key whose record can no longer be
    /// read (it raced with a delete or merge) is skipped.
    pub fn fold<B, F>(&self, mut f: F, init: B) -> B
    where
        F: FnMut(&str, &str, B) -> B,
    {
        let snapshot: Vec<(String, KeyDirEntry)> = self
            .keydir
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), *entry))
            .collect();

        let mut acc = init;
        for (key, entry) in snapshot {
            match self
                .datastore
                .read_value(entry.file_id, &key, entry.value_pos, entry.value_size)
            {
                Ok(value) => acc = f(&key, &value, acc),
                Err(_) => continue,
            }
        }

        acc
    }

    /// Compacts the datastore, rewriting only the live record of each
    /// key and producing hint files for faster startup.
    ///
    /// The active segment is left untouched so appends stay monotonic
    /// during compaction; entries pointing into it are carried forward
    /// unchanged. Superseded segment files are deleted afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::WritePermission`] on a read-only handle.
    /// Corruption or I/O errors while rewriting abort the merge and
    /// leave the previous state in place.
    pub fn merge(&self) -> CaskResult<()> {
        self.require_write("merge")?;

        let snapshot = self.keydir.read().clone();
        // Enumerated before the merge log creates its own segments, so
        // the delete step below cannot touch merge output.
        let stale_files = self.stale_segment_paths()?;
        let active_id = self.active.lock().file_id();

        let mut merge_log = AppendLog::new(
            self.datastore.path(),
            LogKind::Merge,
            self.options.sync_on_put(),
        );
        let mut fresh = KeyDir::new();

        for (key, entry) in snapshot.iter() {
            if entry.file_id == active_id {
                fresh.insert(key.clone(), *entry);
                continue;
            }

            let value = match self.datastore.read_value(
                entry.file_id,
                key,
                entry.value_pos,
                entry.value_size,
            ) {
                Ok(value) => value,
                // A tombstoned record drops out of the merge output.
                Err(e) if e.is_key_not_found() => continue,
                Err(e) => return Err(e),
            };

            let tstamp = now_micros();
            let value_pos = merge_log.append(key, &value, tstamp)?;
            let rewritten = KeyDirEntry {
                file_id: merge_log.file_id(),
                value_pos,
                value_size: value.len() as u32,
                tstamp,
            };
            merge_log.append_hint(key, &rewritten)?;
            fresh.insert(key.clone(), rewritten);
        }

        merge_log.close()?;

        *self.keydir.write() = fresh;

        let mut removed = 0usize;
        for path in &stale_files {
            match fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    // Leftovers are superseded by fresher-timestamped
                    // merge output, so replay stays correct.
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove stale segment");
                }
            }
        }

        tracing::info!(segments_removed = removed, "merge completed");

        Ok(())
    }

    /// Flushes the active segment to durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::WritePermission`] on a read-only handle.
    pub fn sync(&self) -> CaskResult<()> {
        self.require_write("sync")?;

        self.active.lock().sync()
    }

    /// Syncs and closes the datastore.
    ///
    /// The directory lock is released when the handle is dropped,
    /// whether or not `close` was called; `close` additionally makes
    /// writes durable first.
    pub fn close(self) -> CaskResult<()> {
        if self.options.is_writable() {
            self.sync()?;
            self.active.lock().close()?;
        }

        Ok(())
    }

    fn require_write(&self, op: &'static str) -> CaskResult<()> {
        if self.options.is_writable() {
            Ok(())
        } else {
            Err(CaskError::write_permission(op))
        }
    }

    /// Segment files eligible for deletion by merge: everything except
    /// the active segment, dot-files, and the `keydir` snapshot.
    fn stale_segment_paths(&self) -> CaskResult<Vec<PathBuf>> {
        let active_name = data_file_name(self.active.lock().file_id());

        let mut paths = Vec::new();
        for dirent in fs::read_dir(self.datastore.path())? {
            let dirent = dirent?;
            let name = dirent.file_name();
            let Some(name) = name.to_str() else { continue };

            if name.starts_with('.') || name == KEYDIR_FILE || name == active_name {
                continue;
            }
            if name.ends_with(&format!(".{DATA_EXT}")) || name.ends_with(&format!(".{HINT_EXT}")) {
                paths.push(dirent.path());
            }
        }

        Ok(paths)
    }
}
