//! Encrypted envelope format and cipher
//!
//! ```json
//! {
//!   "formatVersion": 1,
//!   "createdAt": "2026-03-01T12:00:00Z",
//!   "salt": "<base64, 16 bytes>",
//!   "iv": "<base64, 12 bytes>",
//!   "ciphertext": "<base64, AES-256-GCM output incl. tag>",
//!   "kdf": { "algorithm": "PBKDF2", "hash": "SHA-256", "iterations": 600000 },
//!   "cipher": "AES-256-GCM"
//! }
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::error::CryptoError;

pub const FORMAT_VERSION: u32 = 1;
pub const DEFAULT_ITERATIONS: u32 = 600_000;
pub const KDF_ALGORITHM: &str = "PBKDF2";
pub const KDF_HASH: &str = "SHA-256";
pub const CIPHER: &str = "AES-256-GCM";

const KEY_BYTES: usize = 32;
const SALT_BYTES: usize = 16;
const IV_BYTES: usize = 12;

/// Envelopes claiming more iterations than this are refused before derivation
const MAX_ITERATIONS: u32 = 10_000_000;

// ============================================================================
// Envelope types
// ============================================================================

/// Key derivation parameters recorded in every envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    pub hash: String,
    pub iterations: u32,
}

impl KdfParams {
    pub fn pbkdf2_sha256(iterations: u32) -> Self {
        Self {
            algorithm: KDF_ALGORITHM.to_string(),
            hash: KDF_HASH.to_string(),
            iterations,
        }
    }
}

/// Self-describing authenticated-encryption envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub salt: String,
    pub iv: String,
    pub ciphertext: String,
    pub kdf: KdfParams,
    pub cipher: String,
}

impl EncryptedEnvelope {
    /// True when a parsed JSON document has the shape of an envelope
    pub fn is_envelope(value: &serde_json::Value) -> bool {
        value.get("formatVersion").is_some() && value.get("ciphertext").is_some()
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, CryptoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects envelopes this build cannot decrypt, before any key derivation
    fn check_supported(&self) -> Result<(), CryptoError> {
        if self.format_version != FORMAT_VERSION {
            return Err(CryptoError::UnsupportedFormat {
                found: self.format_version,
            });
        }
        if !self.kdf.algorithm.eq_ignore_ascii_case(KDF_ALGORITHM)
            || !self.kdf.hash.eq_ignore_ascii_case(KDF_HASH)
        {
            return Err(CryptoError::UnsupportedKdf(format!(
                "{}/{}",
                self.kdf.algorithm, self.kdf.hash
            )));
        }
        if self.kdf.iterations == 0 || self.kdf.iterations > MAX_ITERATIONS {
            return Err(CryptoError::UnsupportedKdf(format!(
                "{} iterations",
                self.kdf.iterations
            )));
        }
        if !self.cipher.eq_ignore_ascii_case(CIPHER) {
            return Err(CryptoError::UnsupportedKdf(self.cipher.clone()));
        }
        Ok(())
    }
}

// ============================================================================
// EnvelopeCipher
// ============================================================================

/// Stateless encrypt/decrypt service
///
/// The iteration count only applies to new envelopes; decryption always
/// uses the count stored in the envelope.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeCipher {
    iterations: u32,
}

impl Default for EnvelopeCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeCipher {
    pub fn new() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }

    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// PBKDF2-HMAC-SHA-256 with this cipher's iteration count, 256-bit output
    pub fn derive_key(&self, password: &str, salt: &[u8]) -> [u8; KEY_BYTES] {
        derive_key(password, salt, self.iterations)
    }

    /// Serializes `payload` to JSON and seals it under `password`
    ///
    /// A fresh salt and IV are drawn for every call.
    pub fn encrypt<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        password: &str,
    ) -> Result<EncryptedEnvelope, CryptoError> {
        let plaintext = serde_json::to_vec(payload)?;

        let salt = random_bytes::<SALT_BYTES>();
        let iv = random_bytes::<IV_BYTES>();
        let key = self.derive_key(password, &salt);

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::UnsupportedKdf(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
            .map_err(|_| CryptoError::Encoding("encryption failed".to_string()))?;

        debug!(
            bytes = plaintext.len(),
            iterations = self.iterations,
            "Sealed payload"
        );

        Ok(EncryptedEnvelope {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            salt: BASE64.encode(salt),
            iv: BASE64.encode(iv),
            ciphertext: BASE64.encode(ciphertext),
            kdf: KdfParams::pbkdf2_sha256(self.iterations),
            cipher: CIPHER.to_string(),
        })
    }

    /// Opens `envelope` with `password` and decodes the JSON payload
    ///
    /// Every failure after the format check (bad base64, wrong lengths,
    /// wrong password, tampering, an undecodable payload) is the single
    /// [`CryptoError::Decryption`].
    pub fn decrypt<T: DeserializeOwned>(
        &self,
        envelope: &EncryptedEnvelope,
        password: &str,
    ) -> Result<T, CryptoError> {
        let plaintext = self.decrypt_bytes(envelope, password)?;
        serde_json::from_slice(&plaintext).map_err(|e| {
            debug!(error = %e, "Decrypted payload did not decode");
            CryptoError::Decryption
        })
    }

    pub fn decrypt_bytes(
        &self,
        envelope: &EncryptedEnvelope,
        password: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        envelope.check_supported()?;

        let salt = decode(&envelope.salt)?;
        let iv = decode(&envelope.iv)?;
        let ciphertext = decode(&envelope.ciphertext)?;
        if iv.len() != IV_BYTES || salt.is_empty() {
            return Err(CryptoError::Decryption);
        }

        let key = derive_key(password, &salt, envelope.kdf.iterations);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Decryption)?;
        cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| CryptoError::Decryption)
    }
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_BYTES] {
    let mut key = [0u8; KEY_BYTES];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn decode(input: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64.decode(input).map_err(|_| CryptoError::Decryption)
}
