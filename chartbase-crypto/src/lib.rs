//! Field-level encryption and deterministic search hashing for Chartbase.
//!
//! The storage engine never sees raw key material. It holds an
//! `Arc<dyn RecordCipher>` and calls three operations:
//!
//! - `protect` — replace configured sensitive fields with authenticated
//!   ciphertext and record deterministic search hashes for string values
//! - `reveal` — decrypt fields on read; a single bad field is logged and
//!   left as ciphertext, never failing the read
//! - `search_hash` — re-hash a query value so equality search works without
//!   decrypting stored data
//!
//! Keys are derived with Argon2id ([`key`]), fields are sealed with
//! ChaCha20-Poly1305 ([`cipher`]), and search hashes are HMAC-SHA-256
//! ([`hash`]). Master-key/session lifecycle is the caller's concern.

mod cipher;
mod error;
mod hash;
mod key;
mod protect;

pub use cipher::{EncryptedData, ALGORITHM_TAG, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use hash::SearchHasher;
pub use key::{derive_key, derive_key_pair, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use protect::{MasterKeyCipher, PassthroughCipher, ProtectedPayload, RecordCipher};
