//! Lazy attachment indexing: fetch, decrypt when needed, and cache previews.

use crate::crypto;
use crate::error::{Error, Result};
use crate::note::Note;
use crate::store::ObjectStore;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// Attachment class, decided by file-name extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Text,
    Image,
    Pdf,
    Other,
}

impl AttachmentKind {
    pub fn classify(path: &str) -> Self {
        let ext = extension(path);
        match ext.as_str() {
            "txt" | "md" | "markdown" | "csv" | "json" | "log" | "xml" | "yaml" | "yml"
            | "html" | "htm" => AttachmentKind::Text,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg" => AttachmentKind::Image,
            "pdf" => AttachmentKind::Pdf,
            _ => AttachmentKind::Other,
        }
    }

    /// Whether previews are built for this class.
    pub fn is_previewable(self) -> bool {
        matches!(self, AttachmentKind::Text | AttachmentKind::Image)
    }
}

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// MIME type for a path, used as the rendering hint.
pub fn mime_type(path: &str) -> &'static str {
    match extension(path).as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "html" | "htm" => "text/html",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// A renderable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePreview {
    pub mime: String,
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
}

impl ImagePreview {
    pub fn new(mime: &str, bytes: &[u8]) -> Self {
        Self {
            mime: mime.to_string(),
            data_url: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    texts: HashMap<String, String>,
    images: HashMap<String, ImagePreview>,
    in_flight: HashSet<String>,
}

/// Decoded previews keyed by storage path.
///
/// Entries are never evicted; only [`AttachmentCache::clear`] drops them.
/// Cloning shares the same underlying cache.
#[derive(Debug, Clone, Default)]
pub struct AttachmentCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl AttachmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.inner.read().texts.get(path).cloned()
    }

    pub fn image(&self, path: &str) -> Option<ImagePreview> {
        self.inner.read().images.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        let inner = self.inner.read();
        inner.texts.contains_key(path) || inner.images.contains_key(path)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.texts.len() + inner.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths whose decoded text contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<String> {
        let needle = query.to_lowercase();
        let inner = self.inner.read();
        let mut hits: Vec<String> = inner
            .texts
            .iter()
            .filter(|(_, text)| text.to_lowercase().contains(&needle))
            .map(|(path, _)| path.clone())
            .collect();
        hits.sort();
        hits
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.texts.clear();
        inner.images.clear();
    }

    /// Reserve `path` for indexing. `None` if cached or already being indexed.
    ///
    /// The reservation is released when the returned [`Claim`] is dropped
    /// without being filled, including on cancellation or panic.
    fn claim(&self, path: &str) -> Option<Claim<'_>> {
        let mut inner = self.inner.write();
        if inner.texts.contains_key(path) || inner.images.contains_key(path) {
            return None;
        }
        if !inner.in_flight.insert(path.to_string()) {
            return None;
        }
        Some(Claim {
            cache: self,
            path: path.to_string(),
            filled: false,
        })
    }

    #[cfg(test)]
    fn is_in_flight(&self, path: &str) -> bool {
        self.inner.read().in_flight.contains(path)
    }

    fn insert(&self, path: &str, preview: Preview) {
        let mut inner = self.inner.write();
        inner.in_flight.remove(path);
        match preview {
            Preview::Text(text) => {
                inner.texts.insert(path.to_string(), text);
            }
            Preview::Image(image) => {
                inner.images.insert(path.to_string(), image);
            }
        }
    }
}

/// An in-flight reservation on one cache path.
struct Claim<'a> {
    cache: &'a AttachmentCache,
    path: String,
    filled: bool,
}

impl Claim<'_> {
    fn fill(mut self, preview: Preview) {
        self.cache.insert(&self.path, preview);
        self.filled = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.filled {
            self.cache.inner.write().in_flight.remove(&self.path);
        }
    }
}

/// Counts from one indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Indexed,
    Skipped,
    Failed,
}

impl IndexReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Indexed => self.indexed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Populates an [`AttachmentCache`] from a note's attachments.
pub struct AttachmentIndexer {
    store: Arc<dyn ObjectStore>,
    cache: AttachmentCache,
    concurrency: usize,
}

impl AttachmentIndexer {
    /// Sequential indexer.
    pub fn new(store: Arc<dyn ObjectStore>, cache: AttachmentCache) -> Self {
        Self {
            store,
            cache,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` attachments in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &AttachmentCache {
        &self.cache
    }

    /// Index every attachment of `note`.
    ///
    /// Per-attachment failures are logged and counted, never returned.
    pub async fn index(&self, note: &Note, password: Option<&str>) -> IndexReport {
        let mut report = IndexReport::default();
        if !note.has_attachments() {
            return report;
        }

        // Plain notes store raw bytes; a password must not trigger decryption.
        let password: Option<Arc<str>> = if note.is_encrypted {
            password.map(Arc::from)
        } else {
            None
        };

        if self.concurrency == 1 {
            for path in &note.attachments {
                let outcome = index_one(
                    self.store.clone(),
                    self.cache.clone(),
                    path.clone(),
                    note.is_encrypted,
                    password.clone(),
                )
                .await;
                report.record(outcome);
            }
        } else {
            let mut tasks = JoinSet::new();
            for path in &note.attachments {
                while tasks.len() >= self.concurrency {
                    if let Some(joined) = tasks.join_next().await {
                        report.record(joined_outcome(joined));
                    }
                }
                tasks.spawn(index_one(
                    self.store.clone(),
                    self.cache.clone(),
                    path.clone(),
                    note.is_encrypted,
                    password.clone(),
                ));
            }
            while let Some(joined) = tasks.join_next().await {
                report.record(joined_outcome(joined));
            }
        }

        debug!(
            note_id = %note.id,
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed,
            "attachment indexing finished"
        );
        report
    }
}

fn joined_outcome(joined: std::result::Result<Outcome, JoinError>) -> Outcome {
    joined.unwrap_or_else(|e| {
        warn!(error = %e, "attachment indexing task did not complete");
        Outcome::Failed
    })
}

async fn index_one(
    store: Arc<dyn ObjectStore>,
    cache: AttachmentCache,
    path: String,
    encrypted: bool,
    password: Option<Arc<str>>,
) -> Outcome {
    let kind = AttachmentKind::classify(&path);
    if !kind.is_previewable() {
        return Outcome::Skipped;
    }
    if encrypted && password.is_none() {
        debug!(path = %path, "no password for encrypted attachment, leaving unindexed");
        return Outcome::Skipped;
    }
    let Some(claim) = cache.claim(&path) else {
        return Outcome::Skipped;
    };

    match load(&*store, &path, kind, password).await {
        Ok(preview) => {
            claim.fill(preview);
            Outcome::Indexed
        }
        Err(e) => {
            warn!(path = %path, error = %e, "failed to index attachment");
            Outcome::Failed
        }
    }
}

enum Preview {
    Text(String),
    Image(ImagePreview),
}

async fn load(
    store: &dyn ObjectStore,
    path: &str,
    kind: AttachmentKind,
    password: Option<Arc<str>>,
) -> Result<Preview> {
    let raw = store.download(path).await.map_err(Error::from)?;
    let mime = mime_type(path);

    let bytes = match password {
        Some(password) => {
            let decrypted = tokio::task::spawn_blocking(move || {
                crypto::decrypt_file(&raw, &password, Some(mime))
            })
            .await??;
            decrypted.bytes
        }
        None => raw,
    };

    Ok(match kind {
        AttachmentKind::Image => Preview::Image(ImagePreview::new(mime, &bytes)),
        _ => Preview::Text(String::from_utf8_lossy(&bytes).into_owned()),
    })
}
