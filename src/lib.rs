//! Note Vault
//!
//! Client-side encryption for a personal notes manager. Note text and file
//! attachments are encrypted with password-derived keys before they reach
//! any store, so the backend only ever holds opaque bytes.
//!
//! # Features
//!
//! - **Key Derivation**: PBKDF2-HMAC-SHA-256 (100,000 rounds), fresh per call
//! - **Text Cipher**: AES-256-GCM, hex-encoded ciphertext/iv/salt triple
//! - **File Cipher**: AES-256-GCM, packed `salt || iv || ciphertext || tag`
//! - **Vault Session**: one unlocked note at a time, idle auto-lock
//! - **Attachment Indexer**: lazy, memoized text and image previews
//!
//! # Architecture
//!
//! ```text
//! unlock: stored ciphertext → Text Cipher → VaultSession → AttachmentIndexer
//! save:   plaintext → Text/File Cipher → ciphertext / packed blob → store
//! ```
//!
//! # Example
//!
//! ```rust
//! use note_vault::crypto;
//!
//! let payload = crypto::encrypt("hello world", "correct-horse").unwrap();
//! let text = crypto::decrypt(&payload.ciphertext, &payload.iv, &payload.salt, "correct-horse")
//!     .unwrap();
//! assert_eq!(text, "hello world");
//!
//! assert!(crypto::decrypt_payload(&payload, "wrong-password").is_err());
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod indexer;
pub mod note;
pub mod session;
pub mod store;

pub use config::VaultConfig;
pub use error::{Error, Result, StoreError, StoreResult};
pub use indexer::{AttachmentCache, AttachmentIndexer, AttachmentKind, ImagePreview, IndexReport};
pub use note::{seal_attachment, Note, NoteDraft};
pub use session::{NoteView, UnlockedNote, VaultSession};
pub use store::{DirStore, FallbackStore, MemoryStore, ObjectStore};
