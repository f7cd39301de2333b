// SPDX-License-Identifier: MIT OR Apache-2.0
//! The owned keyring handle: lock, mutate, flush, roll back.
//!
//! One exclusive lock guards the in-memory store and the synchronous flush,
//! so every operation is a blocking call that either completes durably or
//! fails atomically. Opening a handle is the initialization barrier; drop is
//! teardown and releases all resident key material.

use std::path::Path;

use parking_lot::Mutex;
use rand::RngCore;

use crate::{
    container::KeyStore,
    key::{Key, KeyType},
    keyfile::KeyringFile,
    obfuscation::Obfuscator,
    rotation, KeyringError, Result,
};

/// A key handed back to a caller: owned bytes, caller-managed lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedKey {
    pub key_type: KeyType,
    pub data: Vec<u8>,
}

struct Inner {
    store: KeyStore,
    file: KeyringFile,
}

/// Keyed store for named key material, bound to one keyring file.
pub struct Keyring {
    inner: Mutex<Inner>,
    obfuscator: Obfuscator,
}

impl Keyring {
    /// Open a keyring against `path`, loading existing keys or starting
    /// empty with a freshly created file.
    ///
    /// Keys stored under a previously used path stay on disk untouched and
    /// become visible again by re-opening that path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = KeyringFile::new(path);
        let store = file.load()?;
        Ok(Self {
            inner: Mutex::new(Inner { store, file }),
            obfuscator: Obfuscator::new(),
        })
    }

    /// Store a key. Unowned ids are rotation-resolved to `id:<next>` before
    /// insertion; user-owned duplicates are rejected.
    pub fn store(
        &self,
        id: &str,
        key_type: KeyType,
        user: Option<&str>,
        data: Vec<u8>,
    ) -> Result<()> {
        let mut key = Key::new(id, user, key_type, data)?;

        let mut inner = self.inner.lock();
        if key.is_system() {
            let version = rotation::next_version(&inner.store, key.id());
            key.qualify(version);
        }
        key.encode(&self.obfuscator);

        let signature = key.signature();
        inner.store.insert(key)?;
        if let Err(err) = inner.file.flush(&inner.store) {
            inner.store.remove(&signature).ok();
            return Err(err);
        }
        Ok(())
    }

    /// Fetch a key. Absent signatures are not an error: `Ok(None)`.
    ///
    /// A bare unowned id resolves to the latest stored version and the
    /// returned payload carries a literal `<version>:` prefix, counted in
    /// its length. A version-qualified id returns that version unprefixed.
    pub fn fetch(&self, id: &str, user: Option<&str>) -> Result<Option<FetchedKey>> {
        let inner = self.inner.lock();

        match normalize(user) {
            Some(user) => {
                let signature = signature_of(id, Some(user))?;
                Ok(inner.store.fetch(&signature).map(|key| self.released(key)))
            }
            None => {
                if id.is_empty() {
                    return Err(KeyringError::Validation(
                        "key_id cannot be empty".to_string(),
                    ));
                }
                if rotation::split_versioned(id).is_some() {
                    // Fully qualified: the id is the signature.
                    return Ok(inner.store.fetch(id).map(|key| self.released(key)));
                }
                match rotation::latest_version(&inner.store, id) {
                    Some((version, key)) => {
                        let mut fetched = self.released(key);
                        let mut data = format!("{version}:").into_bytes();
                        data.append(&mut fetched.data);
                        fetched.data = data;
                        Ok(Some(fetched))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Remove the key under (id, user). Unowned ids are never stored bare,
    /// so removing a system key requires its version-qualified id.
    pub fn remove(&self, id: &str, user: Option<&str>) -> Result<()> {
        let signature = signature_of(id, normalize(user))?;

        let mut inner = self.inner.lock();
        let removed = inner.store.remove(&signature)?;
        if let Err(err) = inner.file.flush(&inner.store) {
            inner.store.insert(removed).ok();
            return Err(err);
        }
        Ok(())
    }

    /// Store a freshly generated random payload of `length` bytes. Follows
    /// the same rotation rule as [`Keyring::store`].
    pub fn generate(
        &self,
        id: &str,
        key_type: KeyType,
        user: Option<&str>,
        length: usize,
    ) -> Result<()> {
        let mut data = vec![0u8; length];
        rand::thread_rng().fill_bytes(&mut data);
        self.store(id, key_type, user, data)
    }

    /// Decode a copy of `key` and hand its payload out by value. The
    /// resident key keeps its encoded state.
    fn released(&self, key: &Key) -> FetchedKey {
        let mut copy = key.clone();
        copy.decode(&self.obfuscator);
        FetchedKey {
            key_type: copy.key_type(),
            data: copy.release(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&KeyStore) -> R) -> R {
        f(&self.inner.lock().store)
    }
}

fn normalize(user: Option<&str>) -> Option<&str> {
    user.filter(|u| !u.is_empty())
}

fn signature_of(id: &str, user: Option<&str>) -> Result<String> {
    if id.is_empty() {
        return Err(KeyringError::Validation(
            "key_id cannot be empty".to_string(),
        ));
    }
    let mut signature = String::with_capacity(id.len() + user.map_or(0, str::len));
    signature.push_str(id);
    if let Some(user) = user {
        signature.push_str(user);
    }
    Ok(signature)
}
