//! Packed binary encryption for file attachments.
//!
//! Layout (bit-exact, no magic or version):
//!
//! ```text
//! [0, 16)   salt
//! [16, 28)  iv
//! [28, end) ciphertext || tag (16 bytes)
//! ```

use crate::config::{FILE_HEADER_LENGTH, NONCE_LENGTH, SALT_LENGTH, TAG_LENGTH};
use crate::crypto::kdf::{random_nonce, KeyDerivation};
use crate::error::{Error, Result};

/// A self-contained encrypted file: salt || iv || ciphertext || tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedEncryptedFile(Vec<u8>);

impl PackedEncryptedFile {
    /// Wrap bytes read back from storage.
    ///
    /// Buffers too short to hold a header and a tag can never authenticate.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < FILE_HEADER_LENGTH + TAG_LENGTH {
            return Err(Error::AuthenticationFailed);
        }
        Ok(Self(bytes))
    }

    pub fn salt(&self) -> &[u8] {
        &self.0[..SALT_LENGTH]
    }

    pub fn iv(&self) -> &[u8] {
        &self.0[SALT_LENGTH..FILE_HEADER_LENGTH]
    }

    /// Ciphertext including the trailing authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.0[FILE_HEADER_LENGTH..]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Decrypted file contents plus the caller's rendering hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedFile {
    pub bytes: Vec<u8>,
    /// Content type supplied by the caller; the packed format carries none.
    pub declared_type: Option<String>,
}

/// Encrypt a file with its own fresh salt and nonce.
pub fn encrypt_file(bytes: &[u8], password: &str) -> Result<PackedEncryptedFile> {
    let kdf = KeyDerivation::new();
    let iv = random_nonce();
    let key = kdf.encryption_key(password)?;
    let ciphertext = key.seal(&iv, bytes)?;

    let mut packed = Vec::with_capacity(FILE_HEADER_LENGTH + ciphertext.len());
    packed.extend_from_slice(kdf.salt());
    packed.extend_from_slice(&iv);
    packed.extend_from_slice(&ciphertext);

    Ok(PackedEncryptedFile(packed))
}

/// Decrypt a packed buffer, tagging the result with `declared_type`.
pub fn decrypt_file(
    packed: &[u8],
    password: &str,
    declared_type: Option<&str>,
) -> Result<DecryptedFile> {
    if packed.len() < FILE_HEADER_LENGTH + TAG_LENGTH {
        return Err(Error::AuthenticationFailed);
    }

    let (salt, rest) = packed.split_at(SALT_LENGTH);
    let (iv, ciphertext) = rest.split_at(NONCE_LENGTH);
    let iv: &[u8; NONCE_LENGTH] = iv.try_into().map_err(|_| Error::AuthenticationFailed)?;

    let key = KeyDerivation::from_slice(salt)?.decryption_key(password)?;
    let bytes = key.open(iv, ciphertext)?;

    Ok(DecryptedFile {
        bytes,
        declared_type: declared_type.map(str::to_string),
    })
}
