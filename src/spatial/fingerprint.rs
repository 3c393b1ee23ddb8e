//! Content fingerprint of a source composition, used as the index cache key.

use crate::store::StoreIdentity;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::time::UNIX_EPOCH;

/// Hex SHA-256 digest identifying one site composition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of the stores backing a composition and its site coordinates.
    ///
    /// File-backed stores contribute their path, size and modification time,
    /// so replacing a file changes the key. Stores without a path contribute
    /// their label and the coordinates themselves.
    pub fn compute(identities: &[StoreIdentity], coordinates: &[[f64; 2]]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((coordinates.len() as u64).to_le_bytes());

        let mut hash_coordinates = false;
        for identity in identities {
            hasher.update(identity.label.as_bytes());
            hasher.update([0u8]);
            match &identity.path {
                Some(path) => {
                    hasher.update(path.to_string_lossy().as_bytes());
                    if let Ok(meta) = fs::metadata(path) {
                        hasher.update(meta.len().to_le_bytes());
                        let mtime = meta
                            .modified()
                            .ok()
                            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                            .map(|d| d.as_nanos())
                            .unwrap_or(0);
                        hasher.update(mtime.to_le_bytes());
                    }
                }
                None => hash_coordinates = true,
            }
            hasher.update([0u8]);
        }

        if hash_coordinates || identities.is_empty() {
            for [lat, lon] in coordinates {
                hasher.update(lat.to_le_bytes());
                hasher.update(lon.to_le_bytes());
            }
        }

        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
