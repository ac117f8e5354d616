// 🔑 Identity - Deterministic UIDs from canonical names
//
// "Name is a VALUE, UID is IDENTITY" - but here identity is derived from the
// canonical name itself, so every run and every process agrees on it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex characters kept from the SHA-256 digest.
///
/// 64 bits of hash. At a few hundred entities the birthday bound puts the
/// collision odds around 1e-15; tests check the shipped corpus explicitly.
pub const UID_LENGTH: usize = 16;

/// Stable entity identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Wrap a UID read back from a store
    pub fn from_stored(value: impl Into<String>) -> Self {
        Uid(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical key: whitespace collapsed, trimmed, case-folded.
///
/// Used for deduplication and as the hash input of [`assign_uid`].
pub fn canonical_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive the UID of a named entity.
///
/// Pure function of the canonical key: "Wertstoffhof  Nord" and
/// "wertstoffhof nord" get the same UID.
pub fn assign_uid(name: &str) -> Uid {
    let mut hasher = Sha256::new();
    hasher.update(canonical_key(name).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    Uid(digest[..UID_LENGTH].to_string())
}

// ============================================================================
// TESTS
// ============================================================================
