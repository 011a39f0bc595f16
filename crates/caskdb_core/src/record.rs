//! On-disk record formats.
//!
//! Two record kinds share this module. All multi-byte integers are
//! little-endian.
//!
//! ## Data record (data segments)
//!
//! ```text
//! | crc32 (4) | tstamp µs (8) | key size (2) | value size (4) | key (K) | value (V) |
//! ```
//!
//! The CRC-32 (IEEE polynomial) covers everything after itself,
//! including the key and value.
//!
//! ## Hint record (hint files and the `keydir` snapshot)
//!
//! ```text
//! | file id (8) | key size (2) | value size (4) | value pos (4) | tstamp µs (8) | key (K) |
//! ```
//!
//! A hint record carries no value payload and no checksum; it is a
//! replayable index entry, regenerable from the data segments.

use crate::error::{CaskError, CaskResult};

/// Data record header size: crc (4) + tstamp (8) + key size (2) + value size (4).
pub const DATA_HEADER_SIZE: usize = 18;

/// Hint record header size: file id (8) + key size (2) + value size (4)
/// + value pos (4) + tstamp (8).
pub const HINT_HEADER_SIZE: usize = 26;

/// A decoded data-file record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    /// The record's key.
    pub key: String,
    /// The record's value (possibly the tombstone sentinel).
    pub value: String,
    /// Write timestamp, microseconds since the Unix epoch.
    pub tstamp: u64,
}

/// Location of a key's most recent record.
///
/// Held by the in-memory key directory, and persisted verbatim in hint
/// files and the `keydir` snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDirEntry {
    /// Numeric stamp of the segment holding the record; the data file
    /// name is `<file_id>.data`.
    pub file_id: u64,
    /// Byte offset of the record within its segment.
    pub value_pos: u32,
    /// Size of the value payload in bytes.
    pub value_size: u32,
    /// Write timestamp, microseconds since the Unix epoch.
    pub tstamp: u64,
}

/// Encodes a data record.
#[must_use]
pub fn encode_data(key: &str, value: &str, tstamp: u64) -> Vec<u8> {
    debug_assert!(key.len() <= u16::MAX as usize);

    let total = DATA_HEADER_SIZE + key.len() + value.len();
    let mut buf = Vec::with_capacity(total);

    // Checksum placeholder, backfilled below
    buf.extend_from_slice(&[0u8; 4]);

    buf.extend_from_slice(&tstamp.to_le_bytes());
    buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(value.as_bytes());

    let crc = crc32fast::hash(&buf[4..]);
    buf[0..4].copy_from_slice(&crc.to_le_bytes());

    buf
}

/// Decodes the data record at the start of `buf`, verifying its CRC.
///
/// Returns the record and the number of bytes it occupies
/// (`18 + key size + value size`).
///
/// # Errors
///
/// Returns a corruption error if the buffer is too short for the record
/// it claims to hold, if the checksum does not verify, or if the key or
/// value is not valid UTF-8.
pub fn decode_data(buf: &[u8]) -> CaskResult<(DataRecord, usize)> {
    if buf.len() < DATA_HEADER_SIZE {
        return Err(CaskError::corruption("data record header truncated"));
    }

    let expected = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let tstamp = u64::from_le_bytes([
        buf[4], buf[5], buf[6], buf[7], buf[8], buf[9], buf[10], buf[11],
    ]);
    let key_size = u16::from_le_bytes([buf[12], buf[13]]) as usize;
    let value_size = u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]) as usize;

    let total = DATA_HEADER_SIZE + key_size + value_size;
    if buf.len() < total {
        return Err(CaskError::corruption("data record extends past end of segment"));
    }

    let actual = crc32fast::hash(&buf[4..total]);
    if expected != actual {
        return Err(CaskError::ChecksumMismatch { expected, actual });
    }

    let key = decode_str(&buf[DATA_HEADER_SIZE..DATA_HEADER_SIZE + key_size], "key")?;
    let value = decode_str(&buf[DATA_HEADER_SIZE + key_size..total], "value")?;

    Ok((DataRecord { key, value, tstamp }, total))
}

/// Encodes a hint record for `key` pointing at `entry`.
#[must_use]
pub fn encode_hint(key: &str, entry: &KeyDirEntry) -> Vec<u8> {
    debug_assert!(key.len() <= u16::MAX as usize);

    let mut buf = Vec::with_capacity(HINT_HEADER_SIZE + key.len());

    buf.extend_from_slice(&entry.file_id.to_le_bytes());
    buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
    buf.extend_from_slice(&entry.value_size.to_le_bytes());
    buf.extend_from_slice(&entry.value_pos.to_le_bytes());
    buf.extend_from_slice(&entry.tstamp.to_le_bytes());
    buf.extend_from_slice(key.as_bytes());

    buf
}

/// Decodes the hint record at the start of `buf`.
///
/// Returns the key, the reconstructed entry, and the number of bytes
/// consumed (`26 + key size`).
///
/// # Errors
///
/// Returns a corruption error on a truncated record or a non-UTF-8 key.
pub fn decode_hint(buf: &[u8]) -> CaskResult<(String, KeyDirEntry, usize)> {
    if buf.len() < HINT_HEADER_SIZE {
        return Err(CaskError::corruption("hint record header truncated"));
    }

    let file_id = u64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ]);
    let key_size = u16::from_le_bytes([buf[8], buf[9]]) as usize;
    let value_size = u32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]);
    let value_pos = u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]);
    let tstamp = u64::from_le_bytes([
        buf[18], buf[19], buf[20], buf[21], buf[22], buf[23], buf[24], buf[25],
    ]);

    let total = HINT_HEADER_SIZE + key_size;
    if buf.len() < total {
        return Err(CaskError::corruption("hint record extends past end of file"));
    }

    let key = decode_str(&buf[HINT_HEADER_SIZE..total], "key")?;

    let entry = KeyDirEntry {
        file_id,
        value_pos,
        value_size,
        tstamp,
    };

    Ok((key, entry, total))
}

fn decode_str(bytes: &[u8], what: &str) -> CaskResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| CaskError::corruption(format!("record {what} is not valid UTF-8")))
}
