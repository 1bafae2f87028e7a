//! Upload orchestration: validate, upload the photo, insert the row.
//!
//! ```text
//!            ┌──────────── validation / upload / insert failure ───────────┐
//!            │                                                              ▼
//! Idle ─▶ Validating ─▶ UploadingImage ─▶ PersistingRow ─▶ Succeeded    Failed
//!  ▲                                                           │          │
//!  └────────────────────────── next upload ────────────────────┴──────────┘
//! ```
//!
//! The three steps run strictly in order; the insert never starts before the
//! upload has returned. There is no retry and no compensation: when the insert
//! fails after a successful upload the object stays in the bucket.

use crate::error::{Error, Result};
use crate::repository::{MemoryStore, NewMemoryRow, StoredMemory};
use crate::storage::ImageStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Message shown when a failure carries no text of its own
const FALLBACK_MESSAGE: &str = "Upload failed";

/// Message recorded when the caller stops waiting mid-attempt
const INTERRUPTED_MESSAGE: &str = "Upload interrupted";

/// User input for one upload attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDraft {
    pub title: String,
    pub description: String,
    /// Local photo reference, usually from [`crate::ImageAcquisition`]
    pub image_uri: Option<String>,
}

/// Where the orchestrator is in the current attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub enum UploadState {
    #[default]
    Idle,
    Validating,
    UploadingImage,
    PersistingRow,
    Succeeded(StoredMemory),
    Failed { message: String },
}

impl UploadState {
    /// True while an attempt is running
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            UploadState::Validating | UploadState::UploadingImage | UploadState::PersistingRow
        )
    }
}

/// Runs the upload pipeline and exposes its state to the caller.
pub struct UploadOrchestrator {
    images: Arc<dyn ImageStore>,
    memories: Arc<dyn MemoryStore>,
    state: watch::Sender<UploadState>,
}

impl UploadOrchestrator {
    pub fn new(images: Arc<dyn ImageStore>, memories: Arc<dyn MemoryStore>) -> Self {
        let (state, _) = watch::channel(UploadState::Idle);
        Self {
            images,
            memories,
            state,
        }
    }

    /// Upload the draft's photo and store its row.
    ///
    /// Rejected with [`Error::UploadInProgress`] while another attempt is
    /// running; that attempt is left untouched. Any other failure moves the
    /// orchestrator to [`UploadState::Failed`] and is returned unchanged.
    #[instrument(skip(self, draft), fields(title = %draft.title.trim()))]
    pub async fn upload(&self, draft: MemoryDraft) -> Result<StoredMemory> {
        // Check-and-set in one step so a double press cannot slip through
        let entered = self.state.send_if_modified(|state| {
            if state.is_in_progress() {
                false
            } else {
                *state = UploadState::Validating;
                true
            }
        });
        if !entered {
            warn!("Upload rejected, another upload is in progress");
            return Err(Error::UploadInProgress);
        }

        let attempt = AttemptGuard::new(&self.state);
        let outcome = self.run(draft).await;
        attempt.disarm();

        match outcome {
            Ok(created) => {
                info!(memory_id = %created.id, "Memory uploaded");
                self.state.send_replace(UploadState::Succeeded(created.clone()));
                Ok(created)
            }
            Err(err) => {
                let message = display_message(&err);
                warn!(error = %err, "Memory upload failed");
                self.state.send_replace(UploadState::Failed { message });
                Err(err)
            }
        }
    }

    async fn run(&self, draft: MemoryDraft) -> Result<StoredMemory> {
        let MemoryDraft {
            title,
            description,
            image_uri,
        } = draft;

        let image_uri = image_uri
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| Error::Validation("image required".to_string()))?;
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("title required".to_string()));
        }

        self.state.send_replace(UploadState::UploadingImage);
        let uploaded = self.images.upload_image(&image_uri).await?;

        self.state.send_replace(UploadState::PersistingRow);
        self.memories
            .create_memory_row(NewMemoryRow {
                title: title.to_string(),
                description: Some(description),
                image_url: Some(uploaded.public_url),
            })
            .await
    }

    /// Snapshot of the current state
    pub fn state(&self) -> UploadState {
        self.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    /// Loading indicator: true from validation through persistence
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_in_progress()
    }

    /// Message of the last failure, while in the failed state
    pub fn error_message(&self) -> Option<String> {
        match &*self.state.borrow() {
            UploadState::Failed { message } => Some(message.clone()),
            _ => None,
        }
    }
}

/// Releases the in-progress state if the upload future is dropped before
/// it finishes, so a later attempt is not locked out.
struct AttemptGuard<'a> {
    state: &'a watch::Sender<UploadState>,
    armed: bool,
}

impl<'a> AttemptGuard<'a> {
    fn new(state: &'a watch::Sender<UploadState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let released = self.state.send_if_modified(|state| {
            if state.is_in_progress() {
                *state = UploadState::Failed {
                    message: INTERRUPTED_MESSAGE.to_string(),
                };
                true
            } else {
                false
            }
        });
        if released {
            warn!("Upload abandoned before completion");
        }
    }
}

fn display_message(err: &Error) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        message
    }
}
