//! Integration tests for the unlock / select / index flow.

use async_trait::async_trait;
use note_vault::crypto;
use note_vault::{
    seal_attachment, AttachmentCache, AttachmentIndexer, Error, IndexReport, MemoryStore, Note,
    NoteDraft, NoteView, ObjectStore, StoreError, StoreResult, VaultConfig, VaultSession,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PASSWORD: &str = "correct-horse";

/// Store wrapper that counts downloads and fails selected paths.
struct CountingStore {
    inner: MemoryStore,
    downloads: AtomicUsize,
    broken: Vec<String>,
}

impl CountingStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            downloads: AtomicUsize::new(0),
            broken: Vec::new(),
        }
    }

    fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> StoreResult<String> {
        self.inner.upload(bytes, name).await
    }

    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.broken.iter().any(|p| p == path) {
            return Err(StoreError::Transport("connection reset".to_string()));
        }
        self.inner.download(path).await
    }
}

/// An encrypted note with a text, an image, and a pdf attachment.
async fn encrypted_note_with_attachments(store: &MemoryStore) -> Note {
    let text = seal_attachment(store, b"meeting minutes".to_vec(), "minutes.txt", true, Some(PASSWORD))
        .await
        .expect("Failed to upload text");
    let image = seal_attachment(store, vec![0x89, b'P', b'N', b'G'], "logo.png", true, Some(PASSWORD))
        .await
        .expect("Failed to upload image");
    let pdf = seal_attachment(store, b"%PDF-1.7".to_vec(), "scan.pdf", true, Some(PASSWORD))
        .await
        .expect("Failed to upload pdf");

    let mut draft = NoteDraft::new("Board meeting", "quarterly numbers").encrypted();
    draft.attachments = vec![text, image, pdf];
    draft.seal("note-a", Some(PASSWORD)).expect("Failed to seal note")
}

fn plain_note(id: &str) -> Note {
    NoteDraft::new("Groceries", "milk, eggs")
        .seal(id, None)
        .expect("Failed to seal note")
}

#[test]
fn test_example_scenario() {
    let payload = crypto::encrypt("hello world", PASSWORD).unwrap();

    let text = crypto::decrypt(&payload.ciphertext, &payload.iv, &payload.salt, PASSWORD).unwrap();
    assert_eq!(text, "hello world");

    let wrong = crypto::decrypt(&payload.ciphertext, &payload.iv, &payload.salt, "wrong-password");
    assert!(matches!(wrong, Err(Error::AuthenticationFailed)));
}

#[tokio::test]
async fn test_session_exclusivity_on_select() {
    let session = VaultSession::new(&VaultConfig::default(), None);
    let note_a = NoteDraft::new("A", "alpha")
        .encrypted()
        .seal("a", Some(PASSWORD))
        .unwrap();
    let note_b = NoteDraft::new("B", "beta")
        .encrypted()
        .seal("b", Some(PASSWORD))
        .unwrap();

    session.unlock(&note_a, PASSWORD).await.unwrap();
    assert_eq!(session.plaintext("a").unwrap().content, "alpha");

    let view = session.select_note(&note_b).await;
    assert_eq!(
        view,
        NoteView::Locked {
            id: "b".to_string(),
            title: "B".to_string()
        }
    );
    assert!(session.plaintext("a").is_none());
    assert!(session.plaintext("b").is_none());

    session.unlock(&note_b, PASSWORD).await.unwrap();
    assert!(session.plaintext("a").is_none());
    assert_eq!(session.plaintext("b").unwrap().content, "beta");
}

#[tokio::test]
async fn test_select_plain_note_returns_content_and_locks() {
    let session = VaultSession::new(&VaultConfig::default(), None);
    let secret = NoteDraft::new("S", "hidden")
        .encrypted()
        .seal("s", Some(PASSWORD))
        .unwrap();
    session.unlock(&secret, PASSWORD).await.unwrap();

    let view = session.select_note(&plain_note("p")).await;
    assert!(matches!(view, NoteView::Plain { ref content, .. } if content == "milk, eggs"));
    assert!(!session.is_unlocked());
}

#[tokio::test(start_paused = true)]
async fn test_auto_lock_after_idle_window() {
    let session = VaultSession::new(&VaultConfig::default(), None);
    let note = NoteDraft::new("A", "alpha")
        .encrypted()
        .seal("a", Some(PASSWORD))
        .unwrap();

    session.unlock(&note, PASSWORD).await.unwrap();
    let deadline = session.expires_at().unwrap();

    tokio::time::sleep_until(deadline - Duration::from_secs(1)).await;
    assert!(session.is_unlocked());
    // Reading does not extend the window
    assert!(session.plaintext("a").is_some());

    tokio::time::sleep_until(deadline + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;
    assert!(!session.is_unlocked());
    assert!(session.plaintext("a").is_none());
}

#[tokio::test]
async fn test_unlock_triggers_attachment_indexing() {
    let store = MemoryStore::new();
    let note = encrypted_note_with_attachments(&store).await;

    let cache = AttachmentCache::new();
    let indexer = Arc::new(AttachmentIndexer::new(Arc::new(store.clone()), cache.clone()));
    let session = VaultSession::new(&VaultConfig::default(), Some(indexer));

    session.unlock(&note, PASSWORD).await.unwrap();

    for _ in 0..200 {
        if cache.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(cache.text(&note.attachments[0]).as_deref(), Some("meeting minutes"));
    assert_eq!(
        cache.image(&note.attachments[1]).unwrap().data_url,
        "data:image/png;base64,iVBORw=="
    );
    assert!(!cache.contains(&note.attachments[2]));
}

#[tokio::test]
async fn test_index_is_memoized() {
    let memory = MemoryStore::new();
    let note = encrypted_note_with_attachments(&memory).await;
    let store = Arc::new(CountingStore::new(memory));
    let indexer = AttachmentIndexer::new(store.clone(), AttachmentCache::new());

    let first = indexer.index(&note, Some(PASSWORD)).await;
    assert_eq!(first.indexed, 2);
    assert_eq!(first.skipped, 1);
    assert_eq!(store.downloads(), 2);

    let second = indexer.index(&note, Some(PASSWORD)).await;
    assert_eq!(second.indexed, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(store.downloads(), 2);
}

#[tokio::test]
async fn test_index_without_password_leaves_encrypted_unindexed() {
    let store = MemoryStore::new();
    let note = encrypted_note_with_attachments(&store).await;
    let indexer = AttachmentIndexer::new(Arc::new(store), AttachmentCache::new());

    let report = indexer.index(&note, None).await;
    assert_eq!(report.indexed, 0);
    assert!(indexer.cache().is_empty());
}

#[tokio::test]
async fn test_one_bad_attachment_does_not_block_others() {
    let memory = MemoryStore::new();
    let note = encrypted_note_with_attachments(&memory).await;
    let mut store = CountingStore::new(memory);
    store.broken.push(note.attachments[0].clone());
    let indexer = AttachmentIndexer::new(Arc::new(store), AttachmentCache::new());

    let report = indexer.index(&note, Some(PASSWORD)).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.indexed, 1);
    assert!(indexer.cache().image(&note.attachments[1]).is_some());
    assert!(!indexer.cache().contains(&note.attachments[0]));
}

#[tokio::test]
async fn test_wrong_password_fails_per_attachment() {
    let store = MemoryStore::new();
    let note = encrypted_note_with_attachments(&store).await;
    let indexer = AttachmentIndexer::new(Arc::new(store), AttachmentCache::new());

    let report = indexer.index(&note, Some("not-it")).await;
    assert_eq!(report.failed, 2);
    assert!(indexer.cache().is_empty());
}

#[tokio::test]
async fn test_plain_note_attachments_use_raw_bytes() {
    let store = MemoryStore::new();
    store.insert("readme.md", b"# Hello".to_vec());
    store.insert("notes.TXT", b"search me please".to_vec());
    let mut note = plain_note("p");
    note.attachments = vec!["readme.md".to_string(), "notes.TXT".to_string()];

    let indexer =
        AttachmentIndexer::new(Arc::new(store), AttachmentCache::new()).with_concurrency(4);
    // A stray password on a plain note must not trigger decryption.
    let report = indexer.index(&note, Some(PASSWORD)).await;

    assert_eq!(report.indexed, 2);
    assert_eq!(indexer.cache().text("readme.md").as_deref(), Some("# Hello"));
    assert_eq!(indexer.cache().search("SEARCH"), vec!["notes.TXT"]);
}

#[tokio::test]
async fn test_note_without_attachments_is_noop() {
    let store = Arc::new(CountingStore::new(MemoryStore::new()));
    let indexer = AttachmentIndexer::new(store.clone(), AttachmentCache::new());

    let report = indexer.index(&plain_note("p"), None).await;
    assert_eq!(report, IndexReport::default());
    assert_eq!(store.downloads(), 0);
}

/// Store that answers after a delay and records peak concurrent downloads.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowStore {
    fn new(inner: MemoryStore, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for SlowStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str) -> StoreResult<String> {
        self.inner.upload(bytes, name).await
    }

    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.inner.download(path).await
    }
}

fn plain_note_with_text_files(store: &MemoryStore, count: usize) -> Note {
    let mut note = plain_note("p");
    for i in 0..count {
        let path = format!("part-{}.txt", i);
        store.insert(&path, format!("chunk {}", i).into_bytes());
        note.attachments.push(path);
    }
    note
}

#[tokio::test]
async fn test_failed_unlock_clears_previous_note() {
    let session = VaultSession::new(&VaultConfig::default(), None);
    let note_a = NoteDraft::new("A", "alpha")
        .encrypted()
        .seal("a", Some(PASSWORD))
        .unwrap();
    let note_b = NoteDraft::new("B", "beta")
        .encrypted()
        .seal("b", Some(PASSWORD))
        .unwrap();

    session.unlock(&note_a, PASSWORD).await.unwrap();
    let result = session.unlock(&note_b, "wrong-password").await;

    assert!(matches!(result, Err(Error::AuthenticationFailed)));
    assert!(session.plaintext("a").is_none());
    assert!(session.plaintext("b").is_none());
    assert!(!session.is_unlocked());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_index_can_be_retried() {
    let memory = MemoryStore::new();
    let note = plain_note_with_text_files(&memory, 1);
    let store = Arc::new(SlowStore::new(memory, Duration::from_millis(200)));
    let indexer = AttachmentIndexer::new(store, AttachmentCache::new());

    let first = tokio::time::timeout(Duration::from_millis(20), indexer.index(&note, None)).await;
    assert!(first.is_err());
    assert!(indexer.cache().is_empty());

    let second = indexer.index(&note, None).await;
    assert_eq!(second.indexed, 1);
    assert_eq!(indexer.cache().text("part-0.txt").as_deref(), Some("chunk 0"));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_concurrent_index_can_be_retried() {
    let memory = MemoryStore::new();
    let note = plain_note_with_text_files(&memory, 3);
    let store = Arc::new(SlowStore::new(memory, Duration::from_millis(200)));
    let indexer = AttachmentIndexer::new(store, AttachmentCache::new()).with_concurrency(2);

    let first = tokio::time::timeout(Duration::from_millis(20), indexer.index(&note, None)).await;
    assert!(first.is_err());
    // Let the aborted tasks unwind.
    tokio::time::sleep(Duration::from_millis(1)).await;

    let second = indexer.index(&note, None).await;
    assert_eq!(second.indexed, 3);
    assert_eq!(indexer.cache().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_bounds_in_flight_downloads() {
    let memory = MemoryStore::new();
    let note = plain_note_with_text_files(&memory, 6);
    let store = Arc::new(SlowStore::new(memory, Duration::from_millis(10)));
    let indexer =
        AttachmentIndexer::new(store.clone(), AttachmentCache::new()).with_concurrency(2);

    let report = indexer.index(&note, None).await;
    assert_eq!(report.indexed, 6);
    assert_eq!(store.peak(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_index_downloads_one_at_a_time() {
    let memory = MemoryStore::new();
    let note = plain_note_with_text_files(&memory, 4);
    let store = Arc::new(SlowStore::new(memory, Duration::from_millis(10)));
    let indexer = AttachmentIndexer::new(store.clone(), AttachmentCache::new());

    let report = indexer.index(&note, None).await;
    assert_eq!(report.indexed, 4);
    assert_eq!(store.peak(), 1);
}
