//! Sealing of provider credentials stored at rest.
//!
//! A sealed secret is `base64(nonce || ciphertext)`, where the ciphertext is
//! AES-256-GCM output (tag included) under a fresh random 12-byte nonce. The
//! key is SHA-256 of the configured key material.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::MailerError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// An encrypted credential as stored in a provider document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedSecret(String);

impl SealedSecret {
    /// Wraps an already-sealed value read from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Symmetric cipher for [`SealedSecret`]s, keyed per deployment.
#[derive(Clone)]
pub struct SecretCipher {
    aead: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    /// Derives the cipher key from the configured key material.
    pub fn new(key_material: &str) -> Self {
        let key = Sha256::digest(key_material.as_bytes());
        Self {
            aead: Aes256Gcm::new(&key),
        }
    }

    /// Encrypts a plaintext credential.
    pub fn seal(&self, plaintext: &str) -> Result<SealedSecret, MailerError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| MailerError::Secret("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(SealedSecret(STANDARD.encode(out)))
    }

    /// Decrypts a sealed credential, failing if it was tampered with or
    /// sealed under another key.
    pub fn open(&self, sealed: &SealedSecret) -> Result<String, MailerError> {
        let raw = STANDARD
            .decode(sealed.as_str())
            .map_err(|e| MailerError::Secret(format!("not base64: {e}")))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(MailerError::Secret("sealed value too short".into()));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| MailerError::Secret("authentication failed".into()))?;
        String::from_utf8(plaintext)
            .map_err(|_| MailerError::Secret("plaintext is not UTF-8".into()))
    }
}
