//! Rotating append-only segment files.
//!
//! A datastore's log is a sequence of segment files named
//! `<stamp>.data`, where `<stamp>` is a microsecond timestamp taken at
//! creation. Only the newest segment receives appends; when the next
//! record would push it past [`MAX_SEGMENT_SIZE`] the log rotates to a
//! freshly stamped file and the old segment becomes immutable.
//!
//! Two flavors share the implementation: [`LogKind::Active`] is the
//! engine's live write path, and [`LogKind::Merge`] is compaction
//! output, which pairs every data segment with a `<stamp>.hint` file of
//! replayable index entries. Rotation switches both files of a merge
//! pair together.

use crate::error::CaskResult;
use crate::record::{self, KeyDirEntry};
use crate::sio::SafeFile;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Segment size cap in bytes. A record that would push the current
/// segment past this bound triggers rotation.
pub const MAX_SEGMENT_SIZE: usize = 10 * 1024;

/// Extension of data segment files.
pub const DATA_EXT: &str = "data";

/// Extension of hint files paired with merge-produced segments.
pub const HINT_EXT: &str = "hint";

/// Returns the data file name for a segment stamp.
#[must_use]
pub fn data_file_name(file_id: u64) -> String {
    format!("{file_id}.{DATA_EXT}")
}

/// Returns the hint file name for a segment stamp.
#[must_use]
pub fn hint_file_name(file_id: u64) -> String {
    format!("{file_id}.{HINT_EXT}")
}

/// Returns the current time in microseconds since the Unix epoch.
#[must_use]
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Flavor of an append log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Live write path; data segments only.
    Active,
    /// Compaction output; data segments paired with hint files.
    Merge,
}

/// The append side of a datastore's segment log.
///
/// Segment files are created lazily: a fresh `AppendLog` holds no file
/// until the first [`append`](Self::append).
#[derive(Debug)]
pub struct AppendLog {
    dir: PathBuf,
    kind: LogKind,
    sync_on_put: bool,
    data: Option<SafeFile>,
    hint: Option<SafeFile>,
    file_id: u64,
    position: usize,
}

impl AppendLog {
    /// Creates an append log writing into `dir`.
    ///
    /// With `sync_on_put`, every append is fsynced before returning.
    #[must_use]
    pub fn new(dir: &Path, kind: LogKind, sync_on_put: bool) -> Self {
        Self {
            dir: dir.to_path_buf(),
            kind,
            sync_on_put,
            data: None,
            hint: None,
            file_id: 0,
            position: 0,
        }
    }

    /// Appends a data record, rotating first when it would overflow the
    /// current segment.
    ///
    /// Returns the record's byte offset within the segment that
    /// received it.
    pub fn append(&mut self, key: &str, value: &str, tstamp: u64) -> CaskResult<u32> {
        let rec = record::encode_data(key, value, tstamp);

        if self.data.is_none() || self.position + rec.len() > MAX_SEGMENT_SIZE {
            self.rotate()?;
        }

        let offset = self.position;
        if let Some(file) = self.data.as_mut() {
            let n = file.append(&rec)?;
            if self.sync_on_put {
                file.sync()?;
            }
            self.position += n;
        }

        Ok(offset as u32)
    }

    /// Appends a hint record to the hint file paired with the current
    /// segment. Only meaningful for [`LogKind::Merge`] logs; a no-op
    /// otherwise.
    pub fn append_hint(&mut self, key: &str, entry: &KeyDirEntry) -> CaskResult<()> {
        if let Some(hint) = self.hint.as_mut() {
            let rec = record::encode_hint(key, entry);
            hint.append(&rec)?;
        }

        Ok(())
    }

    /// Returns the stamp of the segment currently receiving appends, or
    /// 0 before the first append.
    #[must_use]
    pub fn file_id(&self) -> u64 {
        self.file_id
    }

    /// Forces the current segment's data to durable storage.
    pub fn sync(&mut self) -> CaskResult<()> {
        if let Some(file) = self.data.as_ref() {
            file.sync()?;
        }

        Ok(())
    }

    /// Syncs and closes the current segment pair, if any.
    pub fn close(&mut self) -> CaskResult<()> {
        if let Some(file) = self.data.take() {
            file.sync()?;
        }
        if let Some(hint) = self.hint.take() {
            hint.sync()?;
        }

        Ok(())
    }

    /// Closes the current segment pair and opens a freshly stamped one.
    ///
    /// If a file with the fresh stamp already exists (more than one
    /// rotation within a microsecond), the stamp is advanced until it
    /// is free.
    fn rotate(&mut self) -> CaskResult<()> {
        self.close()?;

        let mut file_id = now_micros();
        while self.dir.join(data_file_name(file_id)).exists() {
            file_id += 1;
        }

        let data = SafeFile::append_only(&self.dir.join(data_file_name(file_id)))?;
        if self.kind == LogKind::Merge {
            let hint = SafeFile::append_only(&self.dir.join(hint_file_name(file_id)))?;
            self.hint = Some(hint);
        }

        tracing::debug!(file_id, kind = ?self.kind, "opened new segment");

        self.data = Some(data);
        self.file_id = file_id;
        self.position = 0;

        Ok(())
    }
}
