// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-facing facade: validates inputs, drives the keyring, reports
//! failures through the logging collaborator.
//!
//! Every validation or storage failure is reported exactly once, with a
//! fixed per-operation message; the wording is part of the contract.

use crate::{keyring::FetchedKey, Keyring, KeyType, KeyringError, Result};

/// Log severity levels understood by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Logging collaborator: one method, one message per failure.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

/// Production sink forwarding to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => tracing::error!("{message}"),
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Info => tracing::info!("{message}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Store,
    Fetch,
    Remove,
    Generate,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Self::Store => "storing",
            Self::Fetch => "fetching",
            Self::Remove => "removing",
            Self::Generate => "generating",
        }
    }
}

/// Facade over a [`Keyring`] plus a [`LogSink`].
pub struct KeyringService<L: LogSink> {
    keyring: Keyring,
    sink: L,
}

impl<L: LogSink> KeyringService<L> {
    pub fn new(keyring: Keyring, sink: L) -> Self {
        Self { keyring, sink }
    }

    /// The underlying keyring handle.
    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Store caller-supplied key material.
    pub fn store(
        &self,
        id: &str,
        key_type: &str,
        user: Option<&str>,
        data: &[u8],
    ) -> Result<()> {
        self.guarded(Operation::Store, || {
            Self::require_id(id)?;
            let key_type: KeyType = key_type.parse()?;
            self.keyring.store(id, key_type, user, data.to_vec())
        })
    }

    /// Fetch a key. Missing keys are a success with no data.
    pub fn fetch(&self, id: &str, user: Option<&str>) -> Result<Option<FetchedKey>> {
        self.guarded(Operation::Fetch, || {
            Self::require_id(id)?;
            self.keyring.fetch(id, user)
        })
    }

    /// Remove a key. A missing key is a failure.
    pub fn remove(&self, id: &str, user: Option<&str>) -> Result<()> {
        self.guarded(Operation::Remove, || {
            Self::require_id(id)?;
            self.keyring.remove(id, user)
        })
    }

    /// Generate and store `length` random bytes under (id, user).
    pub fn generate(
        &self,
        id: &str,
        key_type: &str,
        user: Option<&str>,
        length: usize,
    ) -> Result<()> {
        self.guarded(Operation::Generate, || {
            Self::require_id(id)?;
            let key_type: KeyType = key_type.parse()?;
            self.keyring.generate(id, key_type, user, length)
        })
    }

    fn require_id(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(KeyringError::Validation(
                "key_id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn guarded<T>(&self, operation: Operation, f: impl FnOnce() -> Result<T>) -> Result<T> {
        f().map_err(|err| {
            let message = format!(
                "Error while {} key: {}",
                operation.verb(),
                failure_reason(&err)
            );
            self.sink.log(Severity::Error, &message);
            err
        })
    }
}

fn failure_reason(err: &KeyringError) -> &str {
    match err {
        KeyringError::Validation(reason) => reason,
        KeyringError::NotFound(_) => "key not found",
        KeyringError::Io(_) | KeyringError::Corrupt(_) => "could not flush keys to storage",
    }
}
