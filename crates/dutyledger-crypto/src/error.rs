//! Error types for envelope encryption

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Wrong password, tampered ciphertext or corrupted fields
    ///
    /// Deliberately carries no detail.
    #[error("decryption failed: wrong password or corrupted data")]
    Decryption,

    #[error("unsupported backup format version {found}")]
    UnsupportedFormat { found: u32 },

    #[error("unsupported key derivation or cipher: {0}")]
    UnsupportedKdf(String),

    /// The bytes are not an encrypted envelope
    #[error("invalid envelope encoding: {0}")]
    Encoding(String),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
