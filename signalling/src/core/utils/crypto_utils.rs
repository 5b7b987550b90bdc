//! AES-256-GCM encryption for chat messages at rest.
//!
//! Stored form is `base64(nonce (12 bytes) || ciphertext || tag (16 bytes))`,
//! with a fresh random nonce per message.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid ciphertext encoding")]
    InvalidEncoding,

    #[error("Ciphertext too short")]
    CiphertextTooShort,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: authentication tag verification failed")]
    DecryptionFailed,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageCipher {
    key: [u8; KEY_SIZE],
}

impl fmt::Debug for MessageCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl MessageCipher {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let mut bytes =
            hex::decode(hex_str.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let cipher = Self::from_bytes(&bytes);
        bytes.zeroize();
        cipher
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::EncryptionFailed)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend(ciphertext);

        Ok(STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let sealed = STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidEncoding)?;

        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::CiphertextTooShort);
        }

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::DecryptionFailed)?;
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}
