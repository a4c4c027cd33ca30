//! Note records as persisted by the external record store, and the save path
//! that turns a plaintext draft into one.

use crate::config::{NONCE_LENGTH, SALT_LENGTH};
use crate::crypto::{self, EncryptedTextPayload};
use crate::error::{Error, Result};
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A persisted note.
///
/// When `is_encrypted` is set, `content` is hex ciphertext and `iv`/`salt`
/// are present; otherwise `content` is plaintext and both are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Ordered storage paths.
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Check the encryption invariant and field formats.
    pub fn validate(&self) -> Result<()> {
        match (self.is_encrypted, &self.iv, &self.salt) {
            (true, Some(iv), Some(salt)) => {
                check_hex_len("iv", iv, NONCE_LENGTH)?;
                check_hex_len("salt", salt, SALT_LENGTH)?;
                Ok(())
            }
            (true, _, _) => Err(Error::Validation(format!(
                "note {} is encrypted but missing iv or salt",
                self.id
            ))),
            (false, None, None) => Ok(()),
            (false, _, _) => Err(Error::Validation(format!(
                "note {} is not encrypted but carries iv or salt",
                self.id
            ))),
        }
    }

    /// The stored ciphertext fields, if this note is encrypted.
    pub fn encrypted_payload(&self) -> Option<EncryptedTextPayload> {
        if !self.is_encrypted {
            return None;
        }
        Some(EncryptedTextPayload {
            ciphertext: self.content.clone(),
            iv: self.iv.clone()?,
            salt: self.salt.clone()?,
        })
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

fn check_hex_len(field: &str, value: &str, bytes: usize) -> Result<()> {
    if value.len() != bytes * 2 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Validation(format!(
            "{} must be {} hex characters",
            field,
            bytes * 2
        )));
    }
    Ok(())
}

/// A note being composed, before it is saved.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub encrypt: bool,
    pub category: Option<String>,
    /// Storage paths of attachments already uploaded via [`seal_attachment`].
    pub attachments: Vec<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }

    /// Turn the draft into a persistable note.
    ///
    /// Encryption without a password is rejected before any crypto runs, so a
    /// half-encrypted note can never be produced.
    pub fn seal(self, id: impl Into<String>, password: Option<&str>) -> Result<Note> {
        let id = id.into();
        let (content, iv, salt) = if self.encrypt {
            let password = require_password(password)?;
            let payload = crypto::encrypt(&self.content, password)?;
            debug!(note_id = %id, "sealed note content");
            (payload.ciphertext, Some(payload.iv), Some(payload.salt))
        } else {
            (self.content, None, None)
        };

        Ok(Note {
            id,
            title: self.title,
            content,
            is_encrypted: self.encrypt,
            iv,
            salt,
            attachments: self.attachments,
            category: self.category,
            created_at: Utc::now(),
        })
    }
}

/// Upload an attachment, encrypting it first when `encrypt` is set.
///
/// Returns the storage path to record in the note's attachment list.
pub async fn seal_attachment<S: ObjectStore + ?Sized>(
    store: &S,
    bytes: Vec<u8>,
    name: &str,
    encrypt: bool,
    password: Option<&str>,
) -> Result<String> {
    let body = if encrypt {
        let password = require_password(password)?.to_string();
        tokio::task::spawn_blocking(move || crypto::encrypt_file(&bytes, &password))
            .await??
            .into_bytes()
    } else {
        bytes
    };

    let path = store.upload(body, name).await?;
    debug!(path = %path, encrypted = encrypt, "uploaded attachment");
    Ok(path)
}

fn require_password(password: Option<&str>) -> Result<&str> {
    match password {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(Error::Validation(
            "a password is required to encrypt".to_string(),
        )),
    }
}
