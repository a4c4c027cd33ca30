//! Cryptographic operations for the note vault.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA-256 password-based key derivation
//! - AES-256-GCM text encryption into a hex payload
//! - AES-256-GCM file encryption into a packed binary blob

mod file;
mod kdf;
mod text;

pub use file::{decrypt_file, encrypt_file, DecryptedFile, PackedEncryptedFile};
pub use kdf::{
    random_nonce, random_salt, DecryptionKey, DerivedKey, EncryptionKey, KeyDerivation, Purpose,
};
pub use text::{decrypt, decrypt_payload, encrypt, encrypt_with_salt, EncryptedTextPayload};
