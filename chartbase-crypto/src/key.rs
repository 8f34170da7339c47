//! Key derivation and management.
//!
//! Uses Argon2id for deriving keys from passphrases. Field encryption and
//! search hashing use independent keys so a compromise of the hash key never
//! exposes ciphertext, and vice versa.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Argon2, Params, Version};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of encryption keys in bytes (256 bits for ChaCha20).
pub const KEY_SIZE: usize = 32;

/// Size of salt in bytes.
pub const SALT_SIZE: usize = 16;

/// A derived key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Salt for key derivation.
#[derive(Clone, Debug)]
pub struct Salt {
    bytes: [u8; SALT_SIZE],
}

impl Salt {
    /// Generates a random salt.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a salt from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the salt bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.bytes
    }
}

/// Key derivation parameters.
#[derive(Clone, Debug)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP recommendations for Argon2id (2023)
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Parameters for testing (fast but insecure).
    #[must_use]
    pub fn insecure_fast() -> Self {
        Self {
            memory_cost: 1024, // 1 MiB
            time_cost: 1,
            parallelism: 1,
        }
    }
}

fn argon2(params: &KdfParams, output_len: usize) -> CryptoResult<Argon2<'static>> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(output_len),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        Version::V0x13,
        argon2_params,
    ))
}

/// Derives one encryption key from a passphrase using Argon2id.
pub fn derive_key(passphrase: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<DerivedKey> {
    let mut key_bytes = [0u8; KEY_SIZE];
    argon2(params, KEY_SIZE)?
        .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut key_bytes)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(DerivedKey::from_bytes(key_bytes))
}

/// Derives an (encryption key, search-hash key) pair from one passphrase.
///
/// A single 64-byte Argon2id output is split in half, so the two keys are
/// independent but the KDF cost is paid once.
pub fn derive_key_pair(
    passphrase: &str,
    salt: &Salt,
    params: &KdfParams,
) -> CryptoResult<(DerivedKey, DerivedKey)> {
    let mut output = [0u8; KEY_SIZE * 2];
    argon2(params, KEY_SIZE * 2)?
        .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut enc = [0u8; KEY_SIZE];
    let mut hash = [0u8; KEY_SIZE];
    enc.copy_from_slice(&output[..KEY_SIZE]);
    hash.copy_from_slice(&output[KEY_SIZE..]);
    output.zeroize();

    Ok((DerivedKey::from_bytes(enc), DerivedKey::from_bytes(hash)))
}

/// Generates a random key (for ephemeral stores and tests).
#[must_use]
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    DerivedKey::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let salt = Salt::from_bytes([7u8; SALT_SIZE]);
        let params = KdfParams::insecure_fast();
        let a = derive_key("hunter2", &salt, &params).unwrap();
        let b = derive_key("hunter2", &salt, &params).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salts_give_different_keys() {
        let params = KdfParams::insecure_fast();
        let a = derive_key("hunter2", &Salt::from_bytes([1u8; SALT_SIZE]), &params).unwrap();
        let b = derive_key("hunter2", &Salt::from_bytes([2u8; SALT_SIZE]), &params).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn key_pair_halves_are_distinct() {
        let salt = Salt::from_bytes([3u8; SALT_SIZE]);
        let (enc, hash) = derive_key_pair("hunter2", &salt, &KdfParams::insecure_fast()).unwrap();
        assert_ne!(enc.as_bytes(), hash.as_bytes());
    }

    #[test]
    fn debug_never_prints_key_bytes() {
        let key = generate_random_key();
        let out = format!("{key:?}");
        assert!(out.contains("REDACTED"));
    }
}
