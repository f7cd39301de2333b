//! Key entity: a single stored secret and its derived signature.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{obfuscation::Obfuscator, KeyringError, Result};

/// Allowed key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Aes,
    Rsa,
    Dsa,
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aes => write!(f, "AES"),
            Self::Rsa => write!(f, "RSA"),
            Self::Dsa => write!(f, "DSA"),
        }
    }
}

impl std::str::FromStr for KeyType {
    type Err = KeyringError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AES" => Ok(Self::Aes),
            "RSA" => Ok(Self::Rsa),
            "DSA" => Ok(Self::Dsa),
            _ => Err(KeyringError::Validation("invalid key_type".to_string())),
        }
    }
}

/// A single stored secret: id, optional owning user, type and payload.
///
/// The payload is tracked as either plain or encoded; the store only ever
/// holds keys in the encoded state. Payload bytes are wiped on drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    id: String,
    user: Option<String>,
    key_type: KeyType,
    data: Vec<u8>,
    encoded: bool,
}

impl Key {
    /// Build a plain (not yet encoded) key.
    ///
    /// An empty id is rejected. An empty user string is treated the same as
    /// an absent user: the signature is byte-identical either way, so the
    /// system-key classification must be too.
    pub fn new(
        id: impl Into<String>,
        user: Option<&str>,
        key_type: KeyType,
        data: Vec<u8>,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(KeyringError::Validation(
                "key_id cannot be empty".to_string(),
            ));
        }
        let user = user.filter(|u| !u.is_empty()).map(str::to_string);
        Ok(Self {
            id,
            user,
            key_type,
            data,
            encoded: false,
        })
    }

    /// Rebuild a key from its on-disk record, payload already encoded.
    pub(crate) fn from_encoded_parts(
        id: String,
        user: Option<String>,
        key_type: KeyType,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id,
            user,
            key_type,
            data,
            encoded: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_encoded(&self) -> bool {
        self.encoded
    }

    /// A key stored with no owning user is a system key.
    pub fn is_system(&self) -> bool {
        self.user.is_none()
    }

    /// Signature: id concatenated with the user (empty when absent).
    ///
    /// No separator is used, so distinct (id, user) pairs can in principle
    /// collide; the format is kept as-is for compatibility.
    pub fn signature(&self) -> String {
        let mut signature =
            String::with_capacity(self.id.len() + self.user.as_deref().map_or(0, str::len));
        signature.push_str(&self.id);
        if let Some(user) = &self.user {
            signature.push_str(user);
        }
        signature
    }

    /// Rewrite the id to its version-qualified form `id:version`.
    pub(crate) fn qualify(&mut self, version: u32) {
        self.id = format!("{}:{version}", self.id);
    }

    /// Apply the obfuscation transform. No-op if already encoded.
    pub fn encode(&mut self, obfuscator: &Obfuscator) {
        if !self.encoded {
            obfuscator.apply(&mut self.data);
            self.encoded = true;
        }
    }

    /// Reverse the obfuscation transform. No-op if already plain.
    pub fn decode(&mut self, obfuscator: &Obfuscator) {
        if self.encoded {
            obfuscator.apply(&mut self.data);
            self.encoded = false;
        }
    }

    /// Transfer payload ownership to the caller, leaving the key empty.
    pub fn release(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}
