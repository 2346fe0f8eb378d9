/// One surface's view of the board state.
///
/// A session owns the current [`AppState`] snapshot and funnels every change
/// through the same path: engine call, save (local then Drive), then cleanup
/// of attachment blobs the change orphaned and a settings mirror.
use std::sync::Arc;

use kanbanx_core::attachments::{orphaned_attachment_ids, BlobError, BlobStore};
use kanbanx_core::capture::{quick_add, Capture, CaptureError};
use kanbanx_core::engine::{self, update_card};
use kanbanx_core::storage::StoreError;
use kanbanx_core::transfer::{export_state, import_state, TransferError};
use kanbanx_core::types::{AppState, AttachmentMeta, DriveSettings};
use thiserror::Error;

use crate::auth::AuthError;
use crate::orchestrator::{RemoteSync, SyncError, SyncOrchestrator};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Attachment storage failed: {0}")]
    Blob(#[from] BlobError),

    #[error("No card {0} on the active board")]
    UnknownCard(String),
}

pub struct Session {
    sync: SyncOrchestrator,
    blobs: Arc<dyn BlobStore>,
    state: AppState,
}

impl Session {
    /// Load the current state, seeding and saving the default on first run.
    pub async fn open(sync: SyncOrchestrator, blobs: Arc<dyn BlobStore>) -> Result<Self, SessionError> {
        let state = match sync.load_state().await? {
            Some(state) => state,
            None => {
                let mut seeded = AppState::seeded();
                if let Some(settings) = sync.store().load_settings().await {
                    seeded.settings = settings;
                }
                log::info!(target: "kanbanx.sync", "No saved boards, seeding default");
                sync.save(&seeded).await?;
                seeded
            }
        };
        Ok(Self { sync, blobs, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn sync(&self) -> &SyncOrchestrator {
        &self.sync
    }

    /// Pick up changes saved by another surface.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        if let Some(state) = self.sync.load_state().await? {
            self.state = state;
        }
        Ok(())
    }

    /// Run an engine operation against the current state and persist the
    /// result. On a failed local save the session keeps its old state.
    pub async fn apply(&mut self, mutation: impl FnOnce(&AppState) -> AppState) -> Result<RemoteSync, SessionError> {
        let next = mutation(&self.state);
        self.commit(next).await
    }

    async fn commit(&mut self, next: AppState) -> Result<RemoteSync, SessionError> {
        let outcome = self.sync.save(&next).await?;
        let previous = std::mem::replace(&mut self.state, next);

        for id in orphaned_attachment_ids(&previous, &self.state) {
            if let Err(e) = self.blobs.delete(&id).await {
                log::warn!(target: "kanbanx.attachments", "Unable to delete blob {}: {}", id, e);
            }
        }
        if previous.settings != self.state.settings {
            self.sync.store().save_settings(&self.state.settings).await;
        }
        Ok(outcome)
    }

    /// Quick-add from a capture; a full first column declines without saving.
    pub async fn quick_add(&mut self, capture: &Capture) -> Result<RemoteSync, SessionError> {
        let next = quick_add(&self.state, capture)?;
        self.commit(next).await
    }

    /// Store a payload and attach its metadata to the card.
    pub async fn attach(
        &mut self,
        card_id: &str,
        name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<AttachmentMeta, SessionError> {
        let known = engine::active_board(&self.state).is_some_and(|b| b.card(card_id).is_some());
        if !known {
            return Err(SessionError::UnknownCard(card_id.to_string()));
        }

        let meta = self.blobs.put(name, content_type, bytes).await?;
        let attached = meta.clone();
        let next = update_card(&self.state, card_id, |card| card.add_attachment(attached));
        if let Err(e) = self.commit(next).await {
            if let Err(cleanup) = self.blobs.delete(&meta.id).await {
                log::warn!(target: "kanbanx.attachments", "Unable to delete blob {}: {}", meta.id, cleanup);
            }
            return Err(e);
        }
        Ok(meta)
    }

    pub async fn detach(&mut self, card_id: &str, attachment_id: &str) -> Result<RemoteSync, SessionError> {
        let next = update_card(&self.state, card_id, |card| card.remove_attachment(attachment_id));
        self.commit(next).await
    }

    pub async fn read_attachment(&self, attachment_id: &str) -> Result<Option<(AttachmentMeta, Vec<u8>)>, SessionError> {
        Ok(self.blobs.get(attachment_id).await?)
    }

    pub fn export(&self) -> Result<String, SessionError> {
        Ok(export_state(&self.state)?)
    }

    /// Replace everything with an exported file. Invalid files leave the
    /// current state untouched.
    pub async fn import(&mut self, text: &str) -> Result<RemoteSync, SessionError> {
        let next = import_state(text)?;
        self.commit(next).await
    }

    pub async fn connect(&self) -> Result<DriveSettings, SessionError> {
        Ok(self.sync.connect(&self.state).await?)
    }

    pub async fn disconnect(&self) {
        self.sync.disconnect().await;
    }

    pub async fn sign_out(&self) {
        self.sync.sign_out().await;
    }
}
