//! Reversible bytewise transform for resident key payloads.
//!
//! Payloads are XORed against a fixed cyclic keystream while owned by the
//! store, so plaintext key material never sits in memory or on disk as-is.
//! The transform is involutive: applying it twice restores the input.

/// Fixed keystream the payload bytes are XORed against.
const KEYSTREAM: &[u8] = b"~k2,B4Fs)ZW@_qE%86Xd+u/=";

/// Obfuscation transform applied at the container boundary.
#[derive(Debug, Clone)]
pub struct Obfuscator {
    keystream: &'static [u8],
}

impl Default for Obfuscator {
    fn default() -> Self {
        Self {
            keystream: KEYSTREAM,
        }
    }
}

impl Obfuscator {
    pub fn new() -> Self {
        Self::default()
    }

    /// XOR `data` in place against the cycled keystream.
    pub fn apply(&self, data: &mut [u8]) {
        for (byte, mask) in data.iter_mut().zip(self.keystream.iter().cycle()) {
            *byte ^= mask;
        }
    }
}
