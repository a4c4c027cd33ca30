//! Single-note unlocked state with an idle auto-lock.
//!
//! A [`VaultSession`] holds decrypted text for at most one note. The state is
//! cleared on explicit [`lock`](VaultSession::lock), on selecting any note,
//! and when the auto-lock deadline passes. Only a fresh successful unlock
//! moves the deadline; reading or editing the note does not.

use crate::config::VaultConfig;
use crate::crypto;
use crate::error::{Error, Result};
use crate::indexer::AttachmentIndexer;
use crate::note::Note;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Decrypted note text held while unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedNote {
    pub note_id: String,
    pub title: String,
    pub content: String,
}

/// What the caller may show after selecting a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteView {
    /// Unencrypted note, readable as-is.
    Plain {
        id: String,
        title: String,
        content: String,
    },
    /// Encrypted note; needs [`VaultSession::unlock`].
    Locked { id: String, title: String },
}

#[derive(Debug)]
struct Unlocked {
    note: UnlockedNote,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct SessionState {
    unlocked: Option<Unlocked>,
    /// Bumped on every transition so a stale timer never locks a newer unlock.
    generation: u64,
}

impl SessionState {
    fn clear(&mut self) {
        self.unlocked = None;
        self.generation += 1;
    }

    /// Current unlocked entry, dropping it if its deadline already passed.
    fn live(&mut self) -> Option<&Unlocked> {
        if matches!(&self.unlocked, Some(u) if Instant::now() >= u.expires_at) {
            self.clear();
        }
        self.unlocked.as_ref()
    }
}

/// Owner of the in-memory plaintext cache and its auto-lock timer.
pub struct VaultSession {
    state: Arc<Mutex<SessionState>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    auto_lock: Duration,
    indexer: Option<Arc<AttachmentIndexer>>,
}

impl VaultSession {
    pub fn new(config: &VaultConfig, indexer: Option<Arc<AttachmentIndexer>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            timer: Mutex::new(None),
            auto_lock: config.auto_lock,
            indexer,
        }
    }

    /// Decrypt `note` and hold its plaintext until the idle window elapses.
    ///
    /// Any previously unlocked note is locked first. On failure the session
    /// stays locked and the error is returned; a wrong password surfaces as
    /// [`Error::AuthenticationFailed`]. If the session is locked or another
    /// note is selected while decryption runs, the plaintext is discarded and
    /// [`Error::Superseded`] is returned.
    pub async fn unlock(&self, note: &Note, password: &str) -> Result<UnlockedNote> {
        note.validate()?;
        let payload = note.encrypted_payload().ok_or_else(|| {
            Error::Validation(format!("note {} is not encrypted", note.id))
        })?;
        self.lock();
        let started = self.state.lock().generation;

        let key = password.to_string();
        let content =
            tokio::task::spawn_blocking(move || crypto::decrypt_payload(&payload, &key)).await??;

        let unlocked = UnlockedNote {
            note_id: note.id.clone(),
            title: note.title.clone(),
            content,
        };
        let expires_at = Instant::now() + self.auto_lock;
        let generation = {
            let mut state = self.state.lock();
            if state.generation != started {
                debug!(note_id = %note.id, "unlock superseded, discarding plaintext");
                return Err(Error::Superseded(note.id.clone()));
            }
            state.generation += 1;
            state.unlocked = Some(Unlocked {
                note: unlocked.clone(),
                expires_at,
            });
            state.generation
        };
        self.schedule_auto_lock(generation, expires_at);
        info!(note_id = %note.id, "note unlocked");

        if let Some(indexer) = &self.indexer {
            spawn_indexing(indexer.clone(), note.clone(), Some(password.to_string()));
        }

        Ok(unlocked)
    }

    /// Switch to `note`, always locking first, even if it is the same note.
    pub async fn select_note(&self, note: &Note) -> NoteView {
        self.lock();

        if note.is_encrypted {
            return NoteView::Locked {
                id: note.id.clone(),
                title: note.title.clone(),
            };
        }

        if let Some(indexer) = &self.indexer {
            spawn_indexing(indexer.clone(), note.clone(), None);
        }
        NoteView::Plain {
            id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
        }
    }

    /// Clear any plaintext and cancel the pending auto-lock.
    pub fn lock(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        let mut state = self.state.lock();
        if let Some(previous) = state.unlocked.as_ref() {
            debug!(note_id = %previous.note.note_id, "note locked");
        }
        state.clear();
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.lock().live().is_some()
    }

    pub fn unlocked_note_id(&self) -> Option<String> {
        self.state.lock().live().map(|u| u.note.note_id.clone())
    }

    /// Decrypted text for `note_id`, if that note is the one currently unlocked.
    pub fn plaintext(&self, note_id: &str) -> Option<UnlockedNote> {
        self.state
            .lock()
            .live()
            .filter(|u| u.note.note_id == note_id)
            .map(|u| u.note.clone())
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.state.lock().live().map(|u| u.expires_at)
    }

    fn schedule_auto_lock(&self, generation: u64, deadline: Instant) {
        let state: Weak<Mutex<SessionState>> = Arc::downgrade(&self.state);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.lock();
            if state.generation == generation {
                if let Some(expired) = state.unlocked.as_ref() {
                    info!(note_id = %expired.note.note_id, "auto-lock after idle timeout");
                }
                state.clear();
            }
        });

        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

/// Index in the background; the task outlives navigation away from the note.
fn spawn_indexing(indexer: Arc<AttachmentIndexer>, note: Note, password: Option<String>) {
    if !note.has_attachments() {
        return;
    }
    tokio::spawn(async move {
        indexer.index(&note, password.as_deref()).await;
    });
}
