//! The in-memory key directory.
//!
//! Maps each live key to the location of its most recent record. Built
//! at open time from, in order of preference:
//!
//! 1. The `keydir` snapshot file, when its modification time is not
//!    earlier than the directory's (a stale or unparsable snapshot is
//!    ignored, since it is regenerable).
//! 2. The hint files left by merges, for segments that have one.
//! 3. A sequential parse of the remaining data segments.
//!
//! Replay applies latest-timestamp-wins across every replayed record,
//! tombstones included, so pre-merge and post-merge records coexisting
//! after a crash resolve to the newest write.
//!
//! The directory holds *live* keys only: a tombstone removes its key
//! rather than being indexed, so `list_keys` and friends never have to
//! touch disk to filter deletions.

use crate::dir::TOMBSTONE;
use crate::error::CaskResult;
use crate::log::{DATA_EXT, HINT_EXT};
use crate::record::{self, KeyDirEntry};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

/// Name of the persisted snapshot inside the datastore directory.
pub const KEYDIR_FILE: &str = "keydir";

/// In-memory index from key to the location of its most recent record.
#[derive(Debug, Default, Clone)]
pub struct KeyDir {
    entries: HashMap<String, KeyDirEntry>,
}

impl KeyDir {
    /// Creates an empty key directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the key directory for the datastore at `path`.
    ///
    /// With `share`, the freshly built directory is persisted as the
    /// `keydir` snapshot so concurrent readers can skip the rebuild.
    pub fn load(path: &Path, share: bool) -> CaskResult<Self> {
        if let Some(keydir) = Self::from_snapshot(path)? {
            return Ok(keydir);
        }

        let keydir = Self::from_segments(path)?;
        if share {
            keydir.persist(path)?;
        }

        Ok(keydir)
    }

    /// Returns the entry for `key`, if the key is live.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&KeyDirEntry> {
        self.entries.get(key)
    }

    /// Installs `entry` as the latest location for `key`.
    pub fn insert(&mut self, key: String, entry: KeyDirEntry) {
        self.entries.insert(key, entry);
    }

    /// Removes `key` from the directory (the key was tombstoned).
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Iterates over the live keys, in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Iterates over `(key, entry)` pairs, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeyDirEntry)> {
        self.entries.iter()
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the directory to the `keydir` snapshot file at `path`,
    /// in hint-record format.
    pub fn persist(&self, path: &Path) -> CaskResult<()> {
        let mut buf = Vec::new();
        for (key, entry) in &self.entries {
            buf.extend_from_slice(&record::encode_hint(key, entry));
        }

        fs::write(path.join(KEYDIR_FILE), &buf)?;

        Ok(())
    }

    /// Attempts the snapshot fast path. Returns `None` when there is no
    /// usable snapshot and the caller must replay the segments.
    fn from_snapshot(path: &Path) -> CaskResult<Option<Self>> {
        let snapshot_path = path.join(KEYDIR_FILE);

        let data = match fs::read(&snapshot_path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if snapshot_is_stale(path, &snapshot_path)? {
            return Ok(None);
        }

        let mut entries = HashMap::new();
        let mut offset = 0;
        while offset < data.len() {
            match record::decode_hint(&data[offset..]) {
                Ok((key, entry, consumed)) => {
                    entries.insert(key, entry);
                    offset += consumed;
                }
                Err(_) => {
                    tracing::warn!("unparsable keydir snapshot, replaying segments instead");
                    return Ok(None);
                }
            }
        }

        Ok(Some(Self { entries }))
    }

    /// Rebuilds the directory by replaying hint and data files.
    fn from_segments(path: &Path) -> CaskResult<Self> {
        let mut data_files: Vec<u64> = Vec::new();
        let mut hint_files: HashSet<u64> = HashSet::new();

        for dirent in fs::read_dir(path)? {
            let dirent = dirent?;
            let name = dirent.file_name();
            let Some(name) = name.to_str() else { continue };

            if let Some(stem) = name.strip_suffix(&format!(".{HINT_EXT}")) {
                if let Ok(id) = stem.parse::<u64>() {
                    hint_files.insert(id);
                }
            } else if let Some(stem) = name.strip_suffix(&format!(".{DATA_EXT}")) {
                if let Ok(id) = stem.parse::<u64>() {
                    data_files.push(id);
                }
            }
        }

        // Latest write per key, tombstones included; tombstoned keys
        // are dropped at the end.
        let mut latest: HashMap<String, (KeyDirEntry, bool)> = HashMap::new();

        for file_id in data_files {
            if hint_files.contains(&file_id) {
                replay_hint_file(path, file_id, &mut latest)?;
            } else {
                replay_data_file(path, file_id, &mut latest)?;
            }
        }

        let entries = latest
            .into_iter()
            .filter(|(_, (_, dead))| !*dead)
            .map(|(key, (entry, _))| (key, entry))
            .collect();

        Ok(Self { entries })
    }
}

/// Returns true when the snapshot's mtime is earlier than the
/// directory's, meaning segments changed after it was written.
fn snapshot_is_stale(dir: &Path, snapshot: &Path) -> CaskResult<bool> {
    let dir_mtime = fs::metadata(dir)?.modified()?;
    let snapshot_mtime = fs::metadata(snapshot)?.modified()?;

    Ok(snapshot_mtime < dir_mtime)
}

/// Installs `entry` unless a strictly newer write for `key` is already
/// recorded.
fn apply(
    latest: &mut HashMap<String, (KeyDirEntry, bool)>,
    key: String,
    entry: KeyDirEntry,
    dead: bool,
) {
    match latest.get(&key) {
        Some((existing, _)) if entry.tstamp < existing.tstamp => {}
        _ => {
            latest.insert(key, (entry, dead));
        }
    }
}

fn replay_data_file(
    path: &Path,
    file_id: u64,
    latest: &mut HashMap<String, (KeyDirEntry, bool)>,
) -> CaskResult<()> {
    let data = fs::read(path.join(crate::log::data_file_name(file_id)))?;

    let mut offset = 0;
    while offset < data.len() {
        let (rec, consumed) = record::decode_data(&data[offset..])?;
        let entry = KeyDirEntry {
            file_id,
            value_pos: offset as u32,
            value_size: rec.value.len() as u32,
            tstamp: rec.tstamp,
        };
        let dead = rec.value == TOMBSTONE;
        apply(latest, rec.key, entry, dead);
        offset += consumed;
    }

    Ok(())
}

fn replay_hint_file(
    path: &Path,
    file_id: u64,
    latest: &mut HashMap<String, (KeyDirEntry, bool)>,
) -> CaskResult<()> {
    let data = fs::read(path.join(crate::log::hint_file_name(file_id)))?;

    let mut offset = 0;
    while offset < data.len() {
        let (key, entry, consumed) = record::decode_hint(&data[offset..])?;
        apply(latest, key, entry, false);
        offset += consumed;
    }

    Ok(())
}
