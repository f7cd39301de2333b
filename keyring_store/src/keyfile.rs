// SPDX-License-Identifier: MIT OR Apache-2.0
//! Crash-safe file persistence for the keyring.
//!
//! # Durability protocol
//!
//! Every flush serializes the full store to `<path>.backup`, fsyncs it, then
//! renames the backup over the primary file. The primary therefore only ever
//! contains a fully-written snapshot, and a backup left on disk is the sole
//! evidence of an interrupted swap.
//!
//! # Load protocol
//!
//! - primary exists and parses: load it (a stale backup is ignored and will
//!   be overwritten by the next flush)
//! - primary missing or unparsable, backup parses: the backup is
//!   authoritative; install it as the new primary and load it
//! - neither exists: start empty and create a fresh primary immediately

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    container::KeyStore,
    key::Key,
    snapshot::{self, KeyRecord, SnapshotError},
    KeyringError, Result,
};

/// Suffix appended to the primary path to derive the backup path.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Persistence engine bound to a primary/backup file pair.
#[derive(Debug, Clone)]
pub struct KeyringFile {
    path: PathBuf,
    backup_path: PathBuf,
}

impl KeyringFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut backup = path.clone().into_os_string();
        backup.push(BACKUP_SUFFIX);
        Self {
            path,
            backup_path: PathBuf::from(backup),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Load the store from disk, recovering from an interrupted swap.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if a keyring file exists but no readable snapshot
    /// can be recovered from it, or `Io` on filesystem failures.
    pub fn load(&self) -> Result<KeyStore> {
        if self.path.exists() {
            match Self::read_records(&self.path) {
                Ok(records) => return Self::build_store(records),
                Err(err) => {
                    if self.backup_path.exists() {
                        tracing::warn!(
                            path = %self.path.display(),
                            error = %err,
                            "primary keyring file unreadable, recovering from backup"
                        );
                        return self.recover_from_backup();
                    }
                    return Err(err.into());
                }
            }
        }

        if self.backup_path.exists() {
            tracing::warn!(
                path = %self.path.display(),
                "primary keyring file missing, recovering from backup"
            );
            return self.recover_from_backup();
        }

        let store = KeyStore::new();
        self.flush(&store)?;
        Ok(store)
    }

    /// Serialize `store` durably and atomically replace the primary file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the backup cannot be written or the rename fails. The
    /// primary file is untouched in that case.
    pub fn flush(&self, store: &KeyStore) -> Result<()> {
        let records: Vec<KeyRecord> = store.iter().map(record_of).collect();

        let file = File::create(&self.backup_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        snapshot::write_snapshot(&mut writer, &records)?;
        writer.flush().map_err(io_err)?;
        writer.get_ref().sync_all().map_err(io_err)?;

        fs::rename(&self.backup_path, &self.path).map_err(io_err)
    }

    /// Treat the backup as authoritative after an interrupted swap.
    fn recover_from_backup(&self) -> Result<KeyStore> {
        let records =
            Self::read_records(&self.backup_path).map_err(|e| KeyringError::Corrupt(e.to_string()))?;
        fs::rename(&self.backup_path, &self.path).map_err(io_err)?;
        Self::build_store(records)
    }

    fn read_records(path: &Path) -> std::result::Result<Vec<KeyRecord>, SnapshotError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        snapshot::read_snapshot(&mut reader)
    }

    fn build_store(records: Vec<KeyRecord>) -> Result<KeyStore> {
        let mut store = KeyStore::new();
        for record in records {
            store.insert(Key::from_encoded_parts(
                record.id,
                record.user,
                record.key_type,
                record.data,
            ))?;
        }
        Ok(store)
    }
}

fn record_of(key: &Key) -> KeyRecord {
    KeyRecord {
        id: key.id().to_string(),
        user: key.user().map(str::to_string),
        key_type: key.key_type(),
        data: key.data().to_vec(),
    }
}

fn io_err(err: std::io::Error) -> KeyringError {
    KeyringError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::{key::KeyType, Obfuscator};

    fn encoded_key(id: &str, user: Option<&str>, data: &[u8]) -> Key {
        let mut key = Key::new(id, user, KeyType::Aes, data.to_vec()).unwrap();
        key.encode(&Obfuscator::default());
        key
    }

    #[test]
    fn test_load_creates_fresh_primary() {
        let dir = tempdir().unwrap();
        let file = KeyringFile::new(dir.path().join("keyring"));

        let store = file.load().unwrap();
        assert!(store.is_empty());
        assert!(file.path().exists());
        assert!(!file.backup_path().exists());
    }

    #[test]
    fn test_flush_load_roundtrip() {
        let dir = tempdir().unwrap();
        let file = KeyringFile::new(dir.path().join("keyring"));

        let mut store = file.load().unwrap();
        store
            .insert(encoded_key("Robert_key", Some("Robert"), b"Robi"))
            .unwrap();
        store.insert(encoded_key("percona_binlog:1", None, b"v1")).unwrap();
        file.flush(&store).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.len(), 2);
        let key = loaded.fetch("Robert_keyRobert").unwrap();
        assert!(key.is_encoded());
        assert_eq!(key.key_type(), KeyType::Aes);
        assert!(loaded.contains("percona_binlog:1"));
    }

    #[test]
    fn test_flush_consumes_backup() {
        let dir = tempdir().unwrap();
        let file = KeyringFile::new(dir.path().join("keyring"));

        let store = file.load().unwrap();
        file.flush(&store).unwrap();

        // The backup only exists transiently during the swap.
        assert!(!file.backup_path().exists());
        assert!(file.path().exists());
    }

    #[test]
    fn test_backup_recovered_when_primary_missing() {
        let dir = tempdir().unwrap();
        let file = KeyringFile::new(dir.path().join("keyring"));

        let mut store = file.load().unwrap();
        store
            .insert(encoded_key("Robert_key", Some("Robert"), b"Robi"))
            .unwrap();
        file.flush(&store).unwrap();

        // Simulate a crash between backup write and rename.
        fs::rename(file.path(), file.backup_path()).unwrap();

        let recovered = file.load().unwrap();
        assert!(recovered.contains("Robert_keyRobert"));
        assert!(file.path().exists());
        assert!(!file.backup_path().exists());
    }

    #[test]
    fn test_backup_recovered_when_primary_corrupt() {
        let dir = tempdir().unwrap();
        let file = KeyringFile::new(dir.path().join("keyring"));

        let mut store = file.load().unwrap();
        store
            .insert(encoded_key("Robert_key", Some("Robert"), b"Robi"))
            .unwrap();
        file.flush(&store).unwrap();

        fs::copy(file.path(), file.backup_path()).unwrap();
        fs::write(file.path(), b"garbage").unwrap();

        let recovered = file.load().unwrap();
        assert!(recovered.contains("Robert_keyRobert"));
    }

    #[test]
    fn test_corrupt_primary_without_backup_fails() {
        let dir = tempdir().unwrap();
        let file = KeyringFile::new(dir.path().join("keyring"));

        fs::write(file.path(), b"garbage").unwrap();

        let result = file.load();
        assert!(matches!(result, Err(KeyringError::Corrupt(_))));
    }

    #[test]
    fn test_flush_failure_leaves_primary_intact() {
        let dir = tempdir().unwrap();
        let file = KeyringFile::new(dir.path().join("keyring"));

        let mut store = file.load().unwrap();
        store
            .insert(encoded_key("Robert_key", Some("Robert"), b"Robi"))
            .unwrap();
        file.flush(&store).unwrap();

        // A directory squatting on the backup path makes the next flush fail.
        fs::create_dir(file.backup_path()).unwrap();
        store
            .insert(encoded_key("Other_key", Some("Robert"), b"x"))
            .unwrap();
        let result = file.flush(&store);
        assert!(matches!(result, Err(KeyringError::Io(_))));

        fs::remove_dir(file.backup_path()).unwrap();
        let loaded = file.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains("Robert_keyRobert"));
    }

    #[test]
    fn test_backup_path_derivation() {
        let file = KeyringFile::new("/var/lib/keyring");
        assert_eq!(file.backup_path(), Path::new("/var/lib/keyring.backup"));
    }
}
