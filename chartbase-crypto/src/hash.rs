//! Deterministic search hashing.
//!
//! Equality search over encrypted fields works by storing a keyed digest of
//! the plaintext next to the ciphertext and re-hashing the query value at
//! search time. HMAC-SHA-256 gives determinism under one key and
//! non-invertibility without it. Range and prefix queries are out of reach
//! by construction; that limitation is deliberate.

use crate::key::DerivedKey;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Keyed, deterministic hasher for searchable encrypted string fields.
#[derive(Clone)]
pub struct SearchHasher {
    key: DerivedKey,
}

impl SearchHasher {
    /// Creates a hasher from a dedicated hash key.
    #[must_use]
    pub fn new(key: DerivedKey) -> Self {
        Self { key }
    }

    /// Hashes a plaintext string to its stable hex digest.
    #[must_use]
    pub fn hash_str(&self, plaintext: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(plaintext.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for SearchHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchHasher").finish_non_exhaustive()
    }
}
