//! Dutyledger Crypto - Password-based authenticated encryption
//!
//! Wraps any serializable payload in a self-describing [`EncryptedEnvelope`]:
//! PBKDF2-HMAC-SHA-256 key derivation, AES-256-GCM encryption, base64 for
//! every binary field. The envelope records its own KDF parameters so it can
//! be decrypted after the defaults change.

pub mod envelope;
pub mod error;

pub use envelope::{EncryptedEnvelope, EnvelopeCipher, KdfParams};
pub use error::CryptoError;
