//! AES-256-GCM codec for secret item bodies.
//!
//! Key derivation is a single SHA-256 of the master passphrase. The nonce is
//! the trailing 12 bytes of the key hash, so a given passphrase always seals
//! with the same nonce. This is required for compatibility with existing
//! stores: every replica must produce identical ciphertext for identical
//! plaintext under the same passphrase.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

/// GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("encoder is not initialized, set the secret key first")]
    NotReady,

    #[error("failed to encode data: {0}")]
    EncodeFailed(String),

    #[error("failed to decode encoded data")]
    DecodeFailed,
}

/// Seals and opens secret bodies.
///
/// The secret model depends on this trait rather than a concrete cipher so
/// tests can substitute their own transformation.
pub trait SecretCodec: Send + Sync {
    fn encode(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// A passphrase-derived AES-256 key, zeroed on drop.
pub struct SecretKey {
    key: [u8; 32],
}

impl SecretKey {
    /// Derive the key as `SHA-256(passphrase)`.
    pub fn derive(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        Self { key: digest.into() }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// AES-256-GCM implementation of [`SecretCodec`].
pub struct AesGcmCodec {
    key: SecretKey,
    nonce: [u8; NONCE_LEN],
}

impl AesGcmCodec {
    /// Build a codec from the master passphrase.
    pub fn new(passphrase: &str) -> Self {
        let key = SecretKey::derive(passphrase);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&key.as_bytes()[32 - NONCE_LEN..]);
        Self { key, nonce }
    }
}

impl SecretCodec for AesGcmCodec {
    /// Seal `plaintext`. The output is `ciphertext || tag`.
    fn encode(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let cipher = Aes256Gcm::new(self.key.as_bytes().into());
        let nonce = Nonce::from(self.nonce);

        cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CodecError::EncodeFailed(e.to_string()))
    }

    /// Open `ciphertext || tag`. Any tamper or key mismatch is rejected by
    /// the authentication tag.
    fn decode(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let cipher = Aes256Gcm::new(self.key.as_bytes().into());
        let nonce = Nonce::from(self.nonce);

        cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|_| CodecError::DecodeFailed)
    }
}

impl Drop for AesGcmCodec {
    fn drop(&mut self) {
        self.nonce.zeroize();
    }
}
