//! Configuration constants and types for the note vault.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Salt length in bytes for key derivation.
pub const SALT_LENGTH: usize = 16;

/// Nonce (IV) length for AES-GCM (96 bits).
pub const NONCE_LENGTH: usize = 12;

/// Authentication tag length (128 bits).
pub const TAG_LENGTH: usize = 16;

/// Derived key length (256 bits).
pub const KEY_LENGTH: usize = 32;

/// PBKDF2-HMAC-SHA-256 iteration count.
///
/// Part of the persisted format: changing it makes every stored note undecryptable.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Packed file header: salt || iv.
pub const FILE_HEADER_LENGTH: usize = SALT_LENGTH + NONCE_LENGTH;

/// Idle window after which an unlocked note is locked again.
pub const DEFAULT_AUTO_LOCK_SECS: u64 = 60;

/// Number of attachments indexed at once (1 = sequential).
pub const DEFAULT_INDEX_CONCURRENCY: usize = 1;

/// Runtime configuration for sessions and attachment indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// How long a note stays unlocked after a successful unlock.
    #[serde(rename = "auto_lock_secs", with = "duration_secs")]
    pub auto_lock: Duration,

    /// Upper bound on attachments fetched and decrypted concurrently.
    pub index_concurrency: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            auto_lock: Duration::from_secs(DEFAULT_AUTO_LOCK_SECS),
            index_concurrency: DEFAULT_INDEX_CONCURRENCY,
        }
    }
}

impl VaultConfig {
    /// Create a configuration with custom settings.
    pub fn new(auto_lock: Duration, index_concurrency: usize) -> Self {
        Self {
            auto_lock,
            index_concurrency: index_concurrency.max(1),
        }
    }

    /// Load a configuration from a JSON file. Missing fields fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.auto_lock.is_zero() {
            return Err(Error::Config(
                "Auto-lock window must be greater than 0".to_string(),
            ));
        }
        if self.index_concurrency == 0 {
            return Err(Error::Config(
                "Index concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
