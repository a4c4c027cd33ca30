//! AES-256-GCM encryption of note text into a hex-encoded payload.

use crate::config::{NONCE_LENGTH, SALT_LENGTH};
use crate::crypto::kdf::{random_nonce, KeyDerivation};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Encrypted note text with everything needed for decryption except the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedTextPayload {
    /// Hex of ciphertext || tag.
    pub ciphertext: String,
    /// Hex of the 12-byte nonce.
    pub iv: String,
    /// Hex of the 16-byte salt.
    pub salt: String,
}

/// Encrypt text with a password and a fresh random salt.
pub fn encrypt(plaintext: &str, password: &str) -> Result<EncryptedTextPayload> {
    encrypt_with_kdf(plaintext, password, KeyDerivation::new())
}

/// Encrypt text reusing a caller-supplied salt. The nonce is still fresh.
pub fn encrypt_with_salt(
    plaintext: &str,
    password: &str,
    salt: [u8; SALT_LENGTH],
) -> Result<EncryptedTextPayload> {
    encrypt_with_kdf(plaintext, password, KeyDerivation::from_salt(salt))
}

fn encrypt_with_kdf(
    plaintext: &str,
    password: &str,
    kdf: KeyDerivation,
) -> Result<EncryptedTextPayload> {
    let iv = random_nonce();
    let key = kdf.encryption_key(password)?;
    let ciphertext = key.seal(&iv, plaintext.as_bytes())?;

    Ok(EncryptedTextPayload {
        ciphertext: hex::encode(ciphertext),
        iv: hex::encode(iv),
        salt: hex::encode(kdf.salt()),
    })
}

/// Decrypt hex-encoded fields with a password.
///
/// A wrong password and tampered ciphertext both yield [`Error::AuthenticationFailed`].
pub fn decrypt(ciphertext_hex: &str, iv_hex: &str, salt_hex: &str, password: &str) -> Result<String> {
    let ciphertext = hex::decode(ciphertext_hex)?;
    let iv: [u8; NONCE_LENGTH] = hex::decode(iv_hex)?.try_into().map_err(|v: Vec<u8>| {
        Error::Validation(format!("iv must be {} bytes, got {}", NONCE_LENGTH, v.len()))
    })?;
    let kdf = KeyDerivation::from_slice(&hex::decode(salt_hex)?)?;

    let key = kdf.decryption_key(password)?;
    let plaintext = key.open(&iv, &ciphertext)?;

    // AEAD already authenticated these bytes; non-UTF-8 here means they were never text.
    String::from_utf8(plaintext).map_err(|e| Error::Encoding(e.to_string()))
}

/// Decrypt a payload produced by [`encrypt`].
pub fn decrypt_payload(payload: &EncryptedTextPayload, password: &str) -> Result<String> {
    decrypt(&payload.ciphertext, &payload.iv, &payload.salt, password)
}
