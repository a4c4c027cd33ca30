//! Object store collaborator for attachment blobs.
//!
//! The vault only ever sees opaque bytes through [`ObjectStore`]. Anything
//! uploaded for an encrypted note is already a packed ciphertext.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Blob storage consumed through exactly two operations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under a name derived from `name`, returning its path.
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> StoreResult<String>;

    /// Fetch the bytes stored at `path`.
    async fn download(&self, path: &str) -> StoreResult<Vec<u8>>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> StoreResult<String> {
        (**self).upload(bytes, name).await
    }

    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        (**self).download(path).await
    }
}

/// Build a unique object path for an uploaded file name.
pub fn object_path(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    format!("{}-{}", uuid::Uuid::new_v4(), sanitized)
}

/// Reads from a primary store, falling back to a legacy store on "not found".
///
/// Uploads always go to the primary store. Any other primary failure is
/// returned as-is without consulting the legacy store.
pub struct FallbackStore<P, L> {
    primary: P,
    legacy: L,
}

impl<P: ObjectStore, L: ObjectStore> FallbackStore<P, L> {
    pub fn new(primary: P, legacy: L) -> Self {
        Self { primary, legacy }
    }
}

#[async_trait]
impl<P: ObjectStore, L: ObjectStore> ObjectStore for FallbackStore<P, L> {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> StoreResult<String> {
        self.primary.upload(bytes, name).await
    }

    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        match self.primary.download(path).await {
            Err(e) if e.is_not_found() => {
                debug!(path, "not in primary store, trying legacy store");
                self.legacy.download(path).await
            }
            result => result,
        }
    }
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place bytes at an exact path.
    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.objects.write().insert(path.into(), bytes);
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.read().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> StoreResult<String> {
        let path = object_path(name);
        self.insert(path.clone(), bytes);
        Ok(path)
    }

    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}

/// Store backed by files under a root directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object path, rejecting anything that escapes the root.
    fn resolve(&self, path: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for DirStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> StoreResult<String> {
        let path = object_path(name);
        let full = self.resolve(&path)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&full, bytes).await?;
        debug!(path = %path, "uploaded object");
        Ok(path)
    }

    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
