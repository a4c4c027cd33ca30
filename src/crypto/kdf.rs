//! PBKDF2-HMAC-SHA-256 key derivation for password-based encryption.

use crate::config::{KEY_LENGTH, NONCE_LENGTH, PBKDF2_ITERATIONS, SALT_LENGTH};
use crate::error::{Error, Result};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// The single capability a derived key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Encrypt,
    Decrypt,
}

/// A derived key, scoped to exactly one purpose.
pub enum DerivedKey {
    Encrypt(EncryptionKey),
    Decrypt(DecryptionKey),
}

/// Encrypt-only AES-256-GCM key.
///
/// Raw key material is never exposed.
pub struct EncryptionKey {
    cipher: Aes256Gcm,
}

/// Decrypt-only AES-256-GCM key.
pub struct DecryptionKey {
    cipher: Aes256Gcm,
}

impl EncryptionKey {
    /// Encrypt with the given nonce and no associated data.
    ///
    /// Returns ciphertext || tag (16 bytes).
    pub fn seal(&self, nonce: &[u8; NONCE_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))
    }
}

impl DecryptionKey {
    /// Authenticate and decrypt ciphertext || tag.
    pub fn open(&self, nonce: &[u8; NONCE_LENGTH], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::AuthenticationFailed)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecryptionKey([REDACTED])")
    }
}

/// Key derivation from a password and a salt.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    salt: [u8; SALT_LENGTH],
}

impl KeyDerivation {
    /// Create a new KDF with a random salt.
    pub fn new() -> Self {
        Self {
            salt: random_salt(),
        }
    }

    /// Create a KDF from an existing salt (for decryption or a pinned salt).
    pub fn from_salt(salt: [u8; SALT_LENGTH]) -> Self {
        Self { salt }
    }

    /// Create a KDF from a salt of unchecked length.
    pub fn from_slice(salt: &[u8]) -> Result<Self> {
        let salt: [u8; SALT_LENGTH] = salt.try_into().map_err(|_| {
            Error::Validation(format!(
                "salt must be {} bytes, got {}",
                SALT_LENGTH,
                salt.len()
            ))
        })?;
        Ok(Self { salt })
    }

    /// Get the salt for storage.
    pub fn salt(&self) -> &[u8; SALT_LENGTH] {
        &self.salt
    }

    /// Derive a key bound to `purpose`.
    ///
    /// Every call re-runs the full 100,000-round stretch; keys are never cached.
    pub fn derive(&self, password: &str, purpose: Purpose) -> Result<DerivedKey> {
        Ok(match purpose {
            Purpose::Encrypt => DerivedKey::Encrypt(self.encryption_key(password)?),
            Purpose::Decrypt => DerivedKey::Decrypt(self.decryption_key(password)?),
        })
    }

    /// Derive an encrypt-only key.
    pub fn encryption_key(&self, password: &str) -> Result<EncryptionKey> {
        Ok(EncryptionKey {
            cipher: self.cipher(password)?,
        })
    }

    /// Derive a decrypt-only key.
    pub fn decryption_key(&self, password: &str) -> Result<DecryptionKey> {
        Ok(DecryptionKey {
            cipher: self.cipher(password)?,
        })
    }

    fn cipher(&self, password: &str) -> Result<Aes256Gcm> {
        let material = self.stretch(password);
        Aes256Gcm::new_from_slice(material.as_slice())
            .map_err(|e| Error::KeyDerivation(e.to_string()))
    }

    fn stretch(&self, password: &str) -> Zeroizing<[u8; KEY_LENGTH]> {
        let mut material = Zeroizing::new([0u8; KEY_LENGTH]);
        pbkdf2::pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            &self.salt,
            PBKDF2_ITERATIONS,
            &mut material[..],
        );
        material
    }
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh random salt.
pub fn random_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Fresh random nonce. Never reused with the same key.
pub fn random_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}
