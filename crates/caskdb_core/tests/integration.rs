//! End-to-end tests over the public engine API.

use caskdb_core::record::decode_data;
use caskdb_core::{CaskError, Database, OpenOption};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const RW: &[OpenOption] = &[OpenOption::ReadWrite];
const RO: &[OpenOption] = &[OpenOption::ReadOnly];

fn files_with_extension(dir: &Path, ext: &str) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect();
    files.sort();
    files
}

/// Decodes every record in every data segment, verifying each CRC, and
/// counts the records carrying `key`.
fn count_records_for_key(dir: &Path, key: &str) -> usize {
    let mut count = 0;
    for path in files_with_extension(dir, "data") {
        let data = fs::read(&path).unwrap();
        let mut offset = 0;
        while offset < data.len() {
            let (rec, consumed) = decode_data(&data[offset..]).unwrap();
            if rec.key == key {
                count += 1;
            }
            offset += consumed;
        }
    }
    count
}

#[test]
fn basic_persistence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let db = Database::open(&path, RW).unwrap();
    db.put("k", "v").unwrap();
    db.close().unwrap();

    let db = Database::open(&path, RW).unwrap();
    assert_eq!(db.get("k").unwrap(), "v");
}

#[test]
fn delete_then_read() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("store"), RW).unwrap();

    db.put("k", "v").unwrap();
    db.delete("k").unwrap();

    let err = db.get("k").unwrap_err();
    assert_eq!(err.to_string(), "k: key does not exist");
}

#[test]
fn two_readers_no_writer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let writer = Database::open(&path, RW).unwrap();
    writer.put("k2", "value2").unwrap();
    writer.put("k3", "value3").unwrap();
    writer.close().unwrap();

    let reader_a = Database::open(&path, RO).unwrap();
    let reader_b = Database::open(&path, RO).unwrap();

    assert_eq!(reader_a.get("k2").unwrap(), "value2");
    assert_eq!(reader_b.get("k2").unwrap(), "value2");
    assert_eq!(reader_a.get("k3").unwrap(), "value3");
    assert_eq!(reader_b.get("k3").unwrap(), "value3");
}

#[test]
fn exclusive_lock_denies_other_handles() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let _writer = Database::open(&path, RW).unwrap();

    let err = Database::open(&path, RO).unwrap_err();
    assert_eq!(err.to_string(), "access denied: datastore is locked");

    let err = Database::open(&path, RW).unwrap_err();
    assert_eq!(err.to_string(), "access denied: datastore is locked");
}

#[test]
fn open_missing_directory_read_only() {
    let dir = tempdir().unwrap();

    let err = Database::open(dir.path().join("nonexistent"), RO).unwrap_err();
    match err {
        CaskError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected the underlying I/O error, got {other:?}"),
    }
}

#[test]
fn segment_rotation_preserves_reads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");
    let db = Database::open(&path, RW).unwrap();

    // 1 KiB values: nine records fit under the 10 240-byte cap, so the
    // tenth put lands in a second segment.
    let value = "x".repeat(1024);
    for i in 0..10 {
        db.put(&format!("key-{i}"), &value).unwrap();
    }

    assert_eq!(files_with_extension(&path, "data").len(), 2);
    for i in 0..10 {
        assert_eq!(db.get(&format!("key-{i}")).unwrap(), value);
    }
}

#[test]
fn merge_reclaims_space() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");
    let db = Database::open(&path, RW).unwrap();

    // Twenty versions of one key, large enough to force rotation, then
    // filler writes so the live version is no longer in the active
    // segment.
    let filler = "f".repeat(1024);
    for i in 1..=20 {
        db.put("k", &format!("{}{i}", "v".repeat(1024))).unwrap();
    }
    for i in 0..10 {
        db.put(&format!("filler-{i}"), &filler).unwrap();
    }

    assert!(count_records_for_key(&path, "k") > 1);

    db.merge().unwrap();

    assert_eq!(count_records_for_key(&path, "k"), 1);
    assert!(db.get("k").unwrap().ends_with("20"));
    assert!(!files_with_extension(&path, "hint").is_empty());

    for i in 0..10 {
        assert_eq!(db.get(&format!("filler-{i}")).unwrap(), filler);
    }
}

#[test]
fn merge_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");
    let db = Database::open(&path, RW).unwrap();

    let value = "y".repeat(1024);
    for i in 0..15 {
        db.put(&format!("key-{i}"), &value).unwrap();
    }

    db.merge().unwrap();
    let mut keys_after_first = db.list_keys();
    keys_after_first.sort();

    db.merge().unwrap();
    let mut keys_after_second = db.list_keys();
    keys_after_second.sort();

    assert_eq!(keys_after_first, keys_after_second);
    for i in 0..15 {
        assert_eq!(count_records_for_key(&path, &format!("key-{i}")), 1);
        assert_eq!(db.get(&format!("key-{i}")).unwrap(), value);
    }
}

#[test]
fn merge_drops_deleted_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");
    let db = Database::open(&path, RW).unwrap();

    let value = "z".repeat(1024);
    for i in 0..12 {
        db.put(&format!("key-{i}"), &value).unwrap();
    }
    for i in 0..6 {
        db.delete(&format!("key-{i}")).unwrap();
    }

    db.merge().unwrap();

    for i in 0..6 {
        assert!(db.get(&format!("key-{i}")).unwrap_err().is_key_not_found());
    }
    for i in 6..12 {
        assert_eq!(db.get(&format!("key-{i}")).unwrap(), value);
    }
    assert_eq!(db.list_keys().len(), 6);
}

#[test]
fn reopen_after_merge() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let db = Database::open(&path, RW).unwrap();
    let value = "w".repeat(1024);
    for i in 0..15 {
        db.put(&format!("key-{i}"), &value).unwrap();
    }
    db.delete("key-0").unwrap();
    db.merge().unwrap();
    db.close().unwrap();

    let db = Database::open(&path, RW).unwrap();
    assert!(db.get("key-0").unwrap_err().is_key_not_found());
    for i in 1..15 {
        assert_eq!(db.get(&format!("key-{i}")).unwrap(), value);
    }
}

#[test]
fn sync_then_reopen_matches_close_then_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let db = Database::open(&path, RW).unwrap();
    db.put("k", "v").unwrap();
    db.sync().unwrap();
    // Dropped without close; the synced write must still be there.
    drop(db);

    let db = Database::open(&path, RW).unwrap();
    assert_eq!(db.get("k").unwrap(), "v");
}

#[test]
fn empty_keys_and_values_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let db = Database::open(&path, RW).unwrap();
    db.put("", "empty-key").unwrap();
    db.put("empty-value", "").unwrap();
    db.close().unwrap();

    let db = Database::open(&path, RW).unwrap();
    assert_eq!(db.get("").unwrap(), "empty-key");
    assert_eq!(db.get("empty-value").unwrap(), "");
}

#[test]
fn sync_on_put_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let db = Database::open(&path, &[OpenOption::ReadWrite, OpenOption::SyncOnPut]).unwrap();
    db.put("k", "durable").unwrap();
    drop(db);

    let db = Database::open(&path, RW).unwrap();
    assert_eq!(db.get("k").unwrap(), "durable");
}

#[test]
fn snapshot_accelerates_reader_opens() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let writer = Database::open(&path, RW).unwrap();
    writer.put("k", "v").unwrap();
    writer.close().unwrap();

    // The first reader rebuilds the directory and leaves a snapshot
    // behind; the second one loads from it.
    let reader = Database::open(&path, RO).unwrap();
    drop(reader);
    assert!(path.join("keydir").exists());

    let reader = Database::open(&path, RO).unwrap();
    assert_eq!(reader.get("k").unwrap(), "v");
}

#[test]
fn observable_state_survives_close_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let db = Database::open(&path, RW).unwrap();
    db.put("a", "1").unwrap();
    db.put("b", "2").unwrap();
    db.put("c", "3").unwrap();
    db.delete("b").unwrap();
    db.put("a", "1-updated").unwrap();

    let mut before: Vec<(String, String)> = db.fold(
        |k, v, mut acc: Vec<(String, String)>| {
            acc.push((k.to_owned(), v.to_owned()));
            acc
        },
        Vec::new(),
    );
    before.sort();
    db.close().unwrap();

    let db = Database::open(&path, RW).unwrap();
    let mut after: Vec<(String, String)> = db.fold(
        |k, v, mut acc: Vec<(String, String)>| {
            acc.push((k.to_owned(), v.to_owned()));
            acc
        },
        Vec::new(),
    );
    after.sort();

    assert_eq!(before, after);
    assert_eq!(
        after,
        [
            ("a".to_owned(), "1-updated".to_owned()),
            ("c".to_owned(), "3".to_owned()),
        ]
    );
}

#[test]
fn concurrent_readers_and_writer_threads() {
    use std::sync::Arc;
    use std::thread;

    let dir = tempdir().unwrap();
    let db = Arc::new(Database::open(dir.path().join("store"), RW).unwrap());

    for i in 0..100 {
        db.put(&format!("key-{i}"), "initial").unwrap();
    }

    let mut handles = Vec::new();

    let writer = Arc::clone(&db);
    handles.push(thread::spawn(move || {
        for i in 0..100 {
            writer.put(&format!("key-{i}"), "updated").unwrap();
        }
    }));

    for _ in 0..4 {
        let reader = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let value = reader.get(&format!("key-{i}")).unwrap();
                assert!(value == "initial" || value == "updated");
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..100 {
        assert_eq!(db.get(&format!("key-{i}")).unwrap(), "updated");
    }
}
