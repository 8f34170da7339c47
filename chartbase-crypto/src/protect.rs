//! Payload protection: the `RecordCipher` seam between the storage engine
//! and the key material.
//!
//! Consumers depend on `Arc<dyn RecordCipher>` and never see raw keys.
//! [`MasterKeyCipher`] is the real implementation; [`PassthroughCipher`]
//! serves stores opened with encryption disabled and most tests.

use crate::cipher::{self, EncryptedData, ALGORITHM_TAG};
use crate::error::CryptoResult;
use crate::hash::SearchHasher;
use crate::key::{derive_key_pair, generate_random_key, DerivedKey, KdfParams, Salt};
use chartbase_model::{EncryptionInfo, FieldPath};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// The result of protecting a payload for persistence.
#[derive(Debug, Clone)]
pub struct ProtectedPayload {
    /// The payload with sensitive fields replaced by base64 ciphertext.
    pub payload: Value,
    /// Present when at least one field was encrypted.
    pub encryption: Option<EncryptionInfo>,
    /// Field path → deterministic hash, for encrypted string values only.
    pub search_hashes: BTreeMap<String, String>,
}

/// Encryption/hashing operations over record payloads.
///
/// Implementations own the key material. `protect` and `reveal` are pure
/// CPU work over JSON values; no I/O happens here.
pub trait RecordCipher: Send + Sync {
    /// Replaces each configured sensitive field that is present in `payload`
    /// with ciphertext, hashing string values for equality search.
    fn protect(&self, payload: &Value, fields: &[FieldPath]) -> CryptoResult<ProtectedPayload>;

    /// Decrypts every field listed in `info`. A failure on one field is
    /// logged and that field keeps its ciphertext form; the rest still
    /// decrypt and the read never fails.
    fn reveal(&self, payload: &Value, info: &EncryptionInfo) -> Value;

    /// Hashes a query value with the same deterministic hash used by
    /// `protect`. `None` when this cipher does not encrypt (then stored
    /// values are plaintext and plain comparison applies).
    fn search_hash(&self, plaintext: &str) -> Option<String>;

    /// Whether this cipher actually encrypts.
    fn is_active(&self) -> bool;
}

/// Real cipher holding a field-encryption key and a search-hash key.
pub struct MasterKeyCipher {
    enc_key: DerivedKey,
    hasher: SearchHasher,
}

impl MasterKeyCipher {
    /// Creates a cipher from an explicit key pair.
    #[must_use]
    pub fn new(enc_key: DerivedKey, hash_key: DerivedKey) -> Self {
        Self {
            enc_key,
            hasher: SearchHasher::new(hash_key),
        }
    }

    /// Derives both keys from a passphrase with Argon2id.
    pub fn from_passphrase(
        passphrase: &str,
        salt: &Salt,
        params: &KdfParams,
    ) -> CryptoResult<Self> {
        let (enc_key, hash_key) = derive_key_pair(passphrase, salt, params)?;
        Ok(Self::new(enc_key, hash_key))
    }

    /// Random keys, for ephemeral stores and tests. Data encrypted this way
    /// is unreadable after the process exits.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::new(generate_random_key(), generate_random_key())
    }
}

impl RecordCipher for MasterKeyCipher {
    fn protect(&self, payload: &Value, fields: &[FieldPath]) -> CryptoResult<ProtectedPayload> {
        let mut protected = payload.clone();
        let mut encrypted_paths = Vec::new();
        let mut search_hashes = BTreeMap::new();

        for path in fields {
            let Some(plain) = path.get(payload) else {
                continue; // field absent from this payload
            };

            if let Some(s) = plain.as_str() {
                search_hashes.insert(path.as_str().to_string(), self.hasher.hash_str(s));
            }

            let plaintext = serde_json::to_vec(plain)?;
            let sealed = cipher::encrypt(&self.enc_key, &plaintext)?;
            if path.set(&mut protected, Value::String(sealed.to_base64())) {
                encrypted_paths.push(path.as_str().to_string());
            }
        }

        let encryption = if encrypted_paths.is_empty() {
            None
        } else {
            Some(EncryptionInfo {
                algorithm: ALGORITHM_TAG.to_string(),
                fields: encrypted_paths,
            })
        };

        Ok(ProtectedPayload {
            payload: protected,
            encryption,
            search_hashes,
        })
    }

    fn reveal(&self, payload: &Value, info: &EncryptionInfo) -> Value {
        let mut revealed = payload.clone();

        for field in &info.fields {
            let Some(slot) = revealed.pointer_mut(field) else {
                warn!(field = %field, "encrypted field missing from payload");
                continue;
            };
            let Some(encoded) = slot.as_str() else {
                warn!(field = %field, "encrypted field is not a ciphertext string");
                continue;
            };

            let plain = EncryptedData::from_base64(encoded)
                .and_then(|sealed| cipher::decrypt(&self.enc_key, &sealed))
                .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(Into::into));

            match plain {
                Ok(value) => *slot = value,
                Err(err) => {
                    // Leave the ciphertext in place; never fail the read.
                    warn!(field = %field, error = %err, "field decryption failed, leaving ciphertext");
                }
            }
        }

        revealed
    }

    fn search_hash(&self, plaintext: &str) -> Option<String> {
        Some(self.hasher.hash_str(plaintext))
    }

    fn is_active(&self) -> bool {
        true
    }
}

/// No-op cipher for stores opened with encryption disabled.
pub struct PassthroughCipher;

impl RecordCipher for PassthroughCipher {
    fn protect(&self, payload: &Value, _fields: &[FieldPath]) -> CryptoResult<ProtectedPayload> {
        Ok(ProtectedPayload {
            payload: payload.clone(),
            encryption: None,
            search_hashes: BTreeMap::new(),
        })
    }

    fn reveal(&self, payload: &Value, _info: &EncryptionInfo) -> Value {
        payload.clone()
    }

    fn search_hash(&self, _plaintext: &str) -> Option<String> {
        None
    }

    fn is_active(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(specs: &[&str]) -> Vec<FieldPath> {
        specs.iter().map(|s| FieldPath::parse(s).unwrap()).collect()
    }

    #[test]
    fn protect_replaces_configured_fields() {
        let cipher = MasterKeyCipher::ephemeral();
        let payload = json!({"name": "Ada Okafor", "gender": "female", "age": 34});
        let fields = paths(&["/name"]);

        let protected = cipher.protect(&payload, &fields).unwrap();
        let stored_name = protected.payload.pointer("/name").unwrap();
        assert_ne!(stored_name, &json!("Ada Okafor"));
        assert_eq!(protected.payload.pointer("/gender"), Some(&json!("female")));

        let info = protected.encryption.unwrap();
        assert_eq!(info.algorithm, ALGORITHM_TAG);
        assert_eq!(info.fields, vec!["/name".to_string()]);
        assert!(protected.search_hashes.contains_key("/name"));
    }

    #[test]
    fn reveal_restores_plaintext() {
        let cipher = MasterKeyCipher::ephemeral();
        let payload = json!({"name": "Ada Okafor", "vitals": {"bp": "120/80"}});
        let fields = paths(&["/name", "/vitals/bp"]);

        let protected = cipher.protect(&payload, &fields).unwrap();
        let revealed = cipher.reveal(&protected.payload, protected.encryption.as_ref().unwrap());
        assert_eq!(revealed, payload);
    }

    #[test]
    fn absent_fields_are_skipped() {
        let cipher = MasterKeyCipher::ephemeral();
        let payload = json!({"gender": "male"});
        let protected = cipher.protect(&payload, &paths(&["/name"])).unwrap();
        assert!(protected.encryption.is_none());
        assert!(protected.search_hashes.is_empty());
        assert_eq!(protected.payload, payload);
    }

    #[test]
    fn non_string_values_are_encrypted_but_not_hashed() {
        let cipher = MasterKeyCipher::ephemeral();
        let payload = json!({"dose_mg": 250});
        let protected = cipher.protect(&payload, &paths(&["/dose_mg"])).unwrap();
        assert!(protected.encryption.is_some());
        assert!(protected.search_hashes.is_empty());

        let revealed = cipher.reveal(&protected.payload, protected.encryption.as_ref().unwrap());
        assert_eq!(revealed, payload);
    }

    #[test]
    fn bad_field_keeps_ciphertext_and_rest_decrypts() {
        let cipher = MasterKeyCipher::ephemeral();
        let payload = json!({"name": "Ada", "ssn": "123-45-6789"});
        let fields = paths(&["/name", "/ssn"]);
        let mut protected = cipher.protect(&payload, &fields).unwrap();

        // Corrupt one field's ciphertext.
        *protected.payload.pointer_mut("/ssn").unwrap() = json!("QUFBQQ==");

        let revealed = cipher.reveal(&protected.payload, protected.encryption.as_ref().unwrap());
        assert_eq!(revealed.pointer("/name"), Some(&json!("Ada")));
        assert_eq!(revealed.pointer("/ssn"), Some(&json!("QUFBQQ==")));
    }

    #[test]
    fn search_hash_matches_protect_hash() {
        let cipher = MasterKeyCipher::ephemeral();
        let payload = json!({"gender": "female"});
        let protected = cipher.protect(&payload, &paths(&["/gender"])).unwrap();
        assert_eq!(
            protected.search_hashes.get("/gender"),
            cipher.search_hash("female").as_ref()
        );
    }

    #[test]
    fn passthrough_changes_nothing() {
        let payload = json!({"name": "Ada"});
        let protected = PassthroughCipher.protect(&payload, &paths(&["/name"])).unwrap();
        assert_eq!(protected.payload, payload);
        assert!(protected.encryption.is_none());
        assert!(PassthroughCipher.search_hash("x").is_none());
        assert!(!PassthroughCipher.is_active());
    }
}
