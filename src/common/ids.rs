//! Deterministic content hashes for datasets and schema fingerprints.

use sha2::{Digest, Sha256};

/// Streaming SHA-256 wrapper producing lowercase hex identifiers.
#[derive(Clone, Debug, Default)]
pub struct ContentHash(Sha256);

impl ContentHash {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    /// Feed bytes into the hash function.
    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    /// Finalise the hash and return a 64-character lowercase hex string.
    pub fn finish_hex(self) -> String {
        self.0
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// One-shot hash of a byte slice.
    pub fn hex_of(bytes: &[u8]) -> String {
        let mut h = Self::new();
        h.update(bytes);
        h.finish_hex()
    }
}
