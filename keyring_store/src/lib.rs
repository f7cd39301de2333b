// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyring Store: keyed storage for named key material.
//!
//! Keys are addressed by a signature derived from their id and owning user.
//! Payloads are held in an obfuscated form while resident and every mutation
//! is flushed to disk before it is acknowledged, using a backup-file swap
//! that keeps a consistent snapshot visible across crashes.
//!
//! Unowned keys ("system keys") are versioned automatically: storing one
//! inserts `id:1`, `id:2`, ... and a bare-id fetch resolves to the latest
//! version with the version number prefixed to the returned payload.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]

mod container;
mod key;
mod keyfile;
mod keyring;
mod obfuscation;
mod rotation;
mod service;
mod snapshot;

use serde::{Deserialize, Serialize};

pub use container::KeyStore;
pub use key::{Key, KeyType};
pub use keyfile::{KeyringFile, BACKUP_SUFFIX};
pub use keyring::{FetchedKey, Keyring};
pub use obfuscation::Obfuscator;
pub use service::{KeyringService, LogSink, Severity, TracingSink};
pub use snapshot::{KeyRecord, SnapshotError, SnapshotHeader};

/// Error types for keyring operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyringError {
    /// Input rejected before touching the store (empty id, bad type, duplicate).
    Validation(String),
    /// No key under the requested signature.
    NotFound(String),
    /// Backup write or primary replace failed; the mutation was rolled back.
    Io(String),
    /// A keyring file exists but does not parse as a snapshot.
    Corrupt(String),
}

impl std::fmt::Display for KeyringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
            Self::NotFound(signature) => write!(f, "key not found: {signature}"),
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::Corrupt(msg) => write!(f, "corrupt keyring file: {msg}"),
        }
    }
}

impl std::error::Error for KeyringError {}

impl From<SnapshotError> for KeyringError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Io(e) => Self::Io(e.to_string()),
            other => Self::Corrupt(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeyringError>;
