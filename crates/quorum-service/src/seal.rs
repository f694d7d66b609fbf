//! Sealed credentials for deferred account links.
//!
//! When a callback matches an existing user by email only, the grant's
//! tokens must survive the confirmation round-trip without being stored
//! against the account yet. They travel to the confirmation page as an
//! opaque blob encrypted with AES-256-GCM; the browser cannot read or
//! forge it.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("failed to seal credential")]
    Seal,

    /// The blob was tampered with, truncated, or sealed under another key.
    #[error("sealed credential could not be opened")]
    Open,
}

/// An encrypted, URL-safe credential blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedCredential(pub String);

/// Seals and opens credential blobs under a key derived from the
/// application secret.
#[derive(Clone)]
pub struct Sealer {
    key: Key<Aes256Gcm>,
}

impl Sealer {
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        Self {
            key: *Key::<Aes256Gcm>::from_slice(&digest),
        }
    }

    pub fn seal<T: Serialize>(&self, value: &T) -> Result<SealedCredential, SealError> {
        let plaintext = serde_json::to_vec(value).map_err(|_| SealError::Seal)?;
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| SealError::Seal)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(SealedCredential(URL_SAFE_NO_PAD.encode(blob)))
    }

    pub fn open<T: DeserializeOwned>(&self, sealed: &SealedCredential) -> Result<T, SealError> {
        let blob = URL_SAFE_NO_PAD
            .decode(&sealed.0)
            .map_err(|_| SealError::Open)?;
        if blob.len() <= NONCE_LEN {
            return Err(SealError::Open);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SealError::Open)?;
        serde_json::from_slice(&plaintext).map_err(|_| SealError::Open)
    }
}
