//! Opaque redaction-policy identity (spec.md #3, "policyHash").

use sha2::{Digest, Sha256};

/// A stable identity for "what rules apply to this document": partitions
/// cache entries so a policy change never serves a stale redaction decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyHash(String);

impl PolicyHash {
    /// Hashes an already-serialized policy representation (e.g. the
    /// canonical JSON of a loaded ruleset). Loading and parsing that
    /// representation is out of scope for this crate (spec.md #1).
    pub fn from_canonical_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PolicyHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PolicyHash {
    /// Convenience for callers (and tests) that already hold a short,
    /// unique policy label rather than a serialized ruleset; hashes it the
    /// same way as [`Self::from_canonical_bytes`].
    fn from(label: &str) -> Self {
        Self::from_canonical_bytes(label.as_bytes())
    }
}
