//! Error types for the note vault.

use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for object store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in vault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any cryptographic work was done.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authenticated decryption failed.
    ///
    /// Wrong password and corrupted ciphertext are reported identically.
    #[error("Decryption failed: invalid key or corrupted data")]
    AuthenticationFailed,

    /// Object store failure, passed through unmodified.
    #[error("Transport error: {0}")]
    Transport(#[from] StoreError),

    /// Malformed hex or other encoding problem in a stored field.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// The session was locked while an unlock was still decrypting.
    #[error("Unlock of note {0} superseded by a lock")]
    Superseded(String),

    /// Key derivation error.
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background crypto task was cancelled or panicked.
    #[error("Task failed: {0}")]
    Task(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors reported by an object store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No object exists at the given path.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Path rejected by the store.
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    /// Network or backend failure.
    #[error("{0}")]
    Transport(String),

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the lookup failed because the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}
