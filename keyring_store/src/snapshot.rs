// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-disk snapshot format for the keyring.
//!
//! Layout:
//! ```text
//! [header: magic, version, flags, entry_count]
//! entry_count x [length: u32][crc32: u32][record payload]
//! ```
//!
//! Records carry the signature components (id, user, type) and the payload
//! in its encoded (obfuscated) form. Checksums cover each record payload so
//! a torn or bit-rotted file is detected at load rather than surfacing as a
//! silently wrong key.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key::KeyType;

/// Magic bytes identifying a keyring snapshot.
const MAGIC: [u8; 4] = *b"KRNG";

/// Current format version.
const CURRENT_VERSION: u32 = 1;

/// Snapshot-format errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// The file does not start with the keyring magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,

    /// The file was written by an unknown format version.
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// CRC32 verification failed for a record.
    #[error("checksum mismatch at record {index}: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Record index where the mismatch occurred.
        index: u64,
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// The file ended before `entry_count` records were read.
    #[error("truncated snapshot at record {index}")]
    TruncatedRecord {
        /// Index of the record that could not be read.
        index: u64,
    },

    /// A record exceeds the `u32::MAX` framing limit.
    #[error("record too large: {size} bytes exceeds u32::MAX")]
    RecordTooLarge {
        /// Record size in bytes.
        size: usize,
    },
}

/// Header identifying a file as a keyring snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub flags: u32,
    pub entry_count: u64,
}

impl SnapshotHeader {
    #[must_use]
    pub const fn new(entry_count: u64) -> Self {
        Self {
            magic: MAGIC,
            version: CURRENT_VERSION,
            flags: 0,
            entry_count,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the magic bytes are invalid or the version is
    /// unsupported.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.magic != MAGIC {
            return Err(SnapshotError::InvalidMagic);
        }
        if self.version != CURRENT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// One stored key as it appears on disk. `data` is the encoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: String,
    pub user: Option<String>,
    pub key_type: KeyType,
    pub data: Vec<u8>,
}

/// Write a full snapshot to `writer`.
///
/// # Errors
///
/// Returns an error if serialization fails, a record exceeds the framing
/// limit, or I/O fails.
pub fn write_snapshot<W: Write>(writer: &mut W, records: &[KeyRecord]) -> Result<(), SnapshotError> {
    let header = SnapshotHeader::new(records.len() as u64);
    bincode::serialize_into(&mut *writer, &header)?;

    for record in records {
        let bytes = bincode::serialize(record)?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| SnapshotError::RecordTooLarge { size: bytes.len() })?;
        let checksum = crc32fast::hash(&bytes);

        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&checksum.to_le_bytes())?;
        writer.write_all(&bytes)?;
    }

    Ok(())
}

/// Read a full snapshot from `reader`, validating header and checksums.
///
/// # Errors
///
/// Returns an error if the header is invalid, the file is truncated, a
/// checksum does not match, or deserialization fails.
pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<Vec<KeyRecord>, SnapshotError> {
    let header: SnapshotHeader = bincode::deserialize_from(&mut *reader)?;
    header.validate()?;

    // Cap the preallocation so a corrupt count cannot trigger a huge alloc.
    let mut records = Vec::with_capacity(header.entry_count.min(1024) as usize);
    for index in 0..header.entry_count {
        let mut frame = [0u8; 8];
        reader.read_exact(&mut frame).map_err(|e| truncated(e, index))?;

        let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let expected = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);

        let mut bytes = vec![0u8; len as usize];
        reader
            .read_exact(&mut bytes)
            .map_err(|e| truncated(e, index))?;

        let actual = crc32fast::hash(&bytes);
        if actual != expected {
            return Err(SnapshotError::ChecksumMismatch {
                index,
                expected,
                actual,
            });
        }

        records.push(bincode::deserialize(&bytes)?);
    }

    Ok(records)
}

fn truncated(err: io::Error, index: u64) -> SnapshotError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        SnapshotError::TruncatedRecord { index }
    } else {
        SnapshotError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<KeyRecord> {
        vec![
            KeyRecord {
                id: "Robert_key".to_string(),
                user: Some("Robert".to_string()),
                key_type: KeyType::Aes,
                data: vec![0xde, 0xad, 0xbe, 0xef],
            },
            KeyRecord {
                id: "percona_binlog:1".to_string(),
                user: None,
                key_type: KeyType::Rsa,
                data: vec![1, 2, 3],
            },
        ]
    }

    #[test]
    fn test_header_validate() {
        assert!(SnapshotHeader::new(3).validate().is_ok());

        let bad_magic = SnapshotHeader {
            magic: *b"XXXX",
            version: CURRENT_VERSION,
            flags: 0,
            entry_count: 0,
        };
        assert!(matches!(
            bad_magic.validate(),
            Err(SnapshotError::InvalidMagic)
        ));

        let bad_version = SnapshotHeader {
            magic: MAGIC,
            version: 99,
            flags: 0,
            entry_count: 0,
        };
        assert!(matches!(
            bad_version.validate(),
            Err(SnapshotError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_write_read_roundtrip() {
        let records = sample_records();
        let mut buffer = Vec::new();
        write_snapshot(&mut buffer, &records).unwrap();

        let loaded = read_snapshot(&mut buffer.as_slice()).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_empty_snapshot_roundtrip() {
        let mut buffer = Vec::new();
        write_snapshot(&mut buffer, &[]).unwrap();

        let loaded = read_snapshot(&mut buffer.as_slice()).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_corrupted_record_detected() {
        let records = sample_records();
        let mut buffer = Vec::new();
        write_snapshot(&mut buffer, &records).unwrap();

        // Flip a bit in the last payload byte.
        let last = buffer.len() - 1;
        buffer[last] ^= 0x01;

        let result = read_snapshot(&mut buffer.as_slice());
        assert!(matches!(
            result,
            Err(SnapshotError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_snapshot_detected() {
        let records = sample_records();
        let mut buffer = Vec::new();
        write_snapshot(&mut buffer, &records).unwrap();

        buffer.truncate(buffer.len() - 2);

        let result = read_snapshot(&mut buffer.as_slice());
        assert!(matches!(
            result,
            Err(SnapshotError::TruncatedRecord { index: 1 })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let garbage = b"not a keyring snapshot at all".to_vec();
        assert!(read_snapshot(&mut garbage.as_slice()).is_err());
    }
}
