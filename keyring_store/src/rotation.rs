// SPDX-License-Identifier: MIT OR Apache-2.0
//! Version derivation and resolution for system keys.
//!
//! System keys are stored under version-qualified ids (`base:1`, `base:2`,
//! ...). Rotation state is never persisted separately: it is recomputed by
//! scanning the container, so the on-disk store stays the single source of
//! truth.

use crate::{container::KeyStore, key::Key};

/// Split a version-qualified id into `(base, version)`.
///
/// The version is the numeric suffix after the last `:`; ids without one
/// are bare.
pub(crate) fn split_versioned(id: &str) -> Option<(&str, u32)> {
    let (base, suffix) = id.rsplit_once(':')?;
    if base.is_empty() || suffix.is_empty() {
        return None;
    }
    suffix.parse::<u32>().ok().map(|version| (base, version))
}

/// Version of `key` if it is a stored version of the system base id `base`.
fn version_of(key: &Key, base: &str) -> Option<u32> {
    if !key.is_system() {
        return None;
    }
    let suffix = key.id().strip_prefix(base)?.strip_prefix(':')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse::<u32>().ok()
}

/// Next version to assign when storing system base id `base`.
///
/// The first store of any system key already creates version 1.
pub(crate) fn next_version(store: &KeyStore, base: &str) -> u32 {
    store
        .iter()
        .filter_map(|key| version_of(key, base))
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

/// Resolve a bare system id to its highest stored version.
pub(crate) fn latest_version<'s>(store: &'s KeyStore, base: &str) -> Option<(u32, &'s Key)> {
    store
        .iter()
        .filter_map(|key| version_of(key, base).map(|version| (version, key)))
        .max_by_key(|(version, _)| *version)
}
