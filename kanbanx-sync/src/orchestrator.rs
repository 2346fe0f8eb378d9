/// Load/save coordination between the local store and the Drive mirror.
///
/// Local storage is the source of truth for saves; Drive is the source of
/// truth on load when it can be read. Passive paths never prompt for
/// authorization and never fail because of the remote side.
use std::sync::Arc;

use kanbanx_core::engine::now_ms;
use kanbanx_core::migrate;
use kanbanx_core::storage::{LocalStore, StoreError};
use kanbanx_core::types::{AppState, DriveSettings};
use thiserror::Error;

use crate::auth::TokenProvider;
use crate::drive::{Access, DriveApi, RemoteError, RequestOptions};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Local storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("Drive connection failed: {0}")]
    Connect(#[from] RemoteError),
}

/// What happened to the remote mirror during a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSync {
    NotConnected,
    Synced,
    /// The remote file was gone and a new one was created.
    Recreated { file_id: String },
    /// No token without prompting.
    Unavailable,
    Failed(String),
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    store: LocalStore,
    drive: Arc<dyn DriveApi>,
    tokens: Arc<dyn TokenProvider>,
}

impl SyncOrchestrator {
    pub fn new(store: LocalStore, drive: Arc<dyn DriveApi>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { store, drive, tokens }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub async fn drive_settings(&self) -> Option<DriveSettings> {
        self.store.load_drive_settings().await
    }

    /// Local and remote state are read concurrently. A readable remote copy
    /// wins and is written back locally; `None` means the caller seeds.
    pub async fn load_state(&self) -> Result<Option<AppState>, StoreError> {
        let (local, remote) = tokio::join!(self.store.load_state(), self.read_remote());

        if let Some(remote) = remote {
            if let Err(e) = &local {
                log::warn!(target: "kanbanx.sync", "Local state unreadable, using Drive copy: {}", e);
            }
            if let Err(e) = self.store.save_state(&remote).await {
                log::warn!(target: "kanbanx.sync", "Unable to mirror Drive state locally: {}", e);
            }
            return Ok(Some(remote));
        }
        local
    }

    async fn read_remote(&self) -> Option<AppState> {
        let settings = self.store.load_drive_settings().await?;
        let file_id = settings.linked_file_id()?.to_string();
        let response = match self.drive.read_file(&file_id, RequestOptions::PASSIVE).await {
            Ok(Access::Granted(response)) => response,
            Ok(Access::Unavailable) => {
                log::debug!(target: "kanbanx.sync", "Drive token unavailable, loading locally");
                return None;
            }
            Err(e) => {
                log::warn!(target: "kanbanx.sync", "Drive read failed: {}", e);
                return None;
            }
        };
        if !response.is_success() {
            log::warn!(target: "kanbanx.sync", "Drive read returned {}", response.status);
            return None;
        }
        let parsed = response
            .json::<serde_json::Value>()
            .map_err(|e| e.to_string())
            .and_then(|value| migrate::from_value(value).map_err(|e| e.to_string()));
        match parsed {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!(target: "kanbanx.sync", "Ignoring unreadable Drive file {}: {}", file_id, e);
                None
            }
        }
    }

    /// Persist locally, then mirror to Drive. Only the local write can fail
    /// the save; the remote outcome is reported.
    pub async fn save(&self, state: &AppState) -> Result<RemoteSync, StoreError> {
        self.store.save_state(state).await?;

        let Some(mut settings) = self.store.load_drive_settings().await else {
            return Ok(RemoteSync::NotConnected);
        };
        let Some(file_id) = settings.linked_file_id().map(str::to_string) else {
            return Ok(RemoteSync::NotConnected);
        };

        let outcome = match self.drive.update_file(&file_id, state, RequestOptions::PASSIVE).await {
            Ok(Access::Unavailable) => RemoteSync::Unavailable,
            Err(e) => RemoteSync::Failed(e.to_string()),
            Ok(Access::Granted(response)) if response.status == 404 => {
                log::info!(target: "kanbanx.sync", "Drive file {} missing, recreating", file_id);
                self.recreate(state, &mut settings).await
            }
            Ok(Access::Granted(response)) if response.is_success() => {
                settings.last_synced_at = now_ms();
                self.store.save_drive_settings(Some(&settings)).await;
                RemoteSync::Synced
            }
            Ok(Access::Granted(response)) => RemoteSync::Failed(format!("Drive update returned {}", response.status)),
        };

        if let RemoteSync::Failed(reason) = &outcome {
            log::warn!(target: "kanbanx.sync", "Drive sync failed: {}", reason);
        }
        Ok(outcome)
    }

    async fn recreate(&self, state: &AppState, settings: &mut DriveSettings) -> RemoteSync {
        match self.drive.create_file(state, RequestOptions::PASSIVE).await {
            Ok(Access::Granted(file_id)) => {
                settings.file_id = Some(file_id.clone());
                settings.last_synced_at = now_ms();
                self.store.save_drive_settings(Some(settings)).await;
                RemoteSync::Recreated { file_id }
            }
            Ok(Access::Unavailable) => RemoteSync::Unavailable,
            Err(e) => RemoteSync::Failed(e.to_string()),
        }
    }

    /// Interactive: attach to the stored or existing Drive file, or create
    /// one, uploading `state` either way.
    pub async fn connect(&self, state: &AppState) -> Result<DriveSettings, SyncError> {
        let opts = RequestOptions::INTERACTIVE;
        let stored_id = self
            .store
            .load_drive_settings()
            .await
            .and_then(|s| s.linked_file_id().map(str::to_string));
        let existing = match stored_id {
            Some(id) => Some(id),
            None => granted(self.drive.find_existing_file(opts).await?)?,
        };

        let file_id = match existing {
            Some(id) => {
                let response = granted(self.drive.update_file(&id, state, opts).await?)?;
                if response.is_success() {
                    Some(id)
                } else if response.status == 404 {
                    log::info!(target: "kanbanx.sync", "Stored Drive file {} is gone", id);
                    None
                } else {
                    return Err(RemoteError::Status {
                        operation: "update",
                        status: response.status,
                    }
                    .into());
                }
            }
            None => None,
        };
        let file_id = match file_id {
            Some(id) => id,
            None => granted(self.drive.create_file(state, opts).await?)?,
        };

        let now = now_ms();
        let settings = DriveSettings {
            file_id: Some(file_id),
            connected_at: now,
            last_synced_at: now,
        };
        self.store.save_drive_settings(Some(&settings)).await;
        log::info!(target: "kanbanx.sync", "Connected to Drive");
        Ok(settings)
    }

    pub async fn disconnect(&self) {
        self.store.save_drive_settings(None).await;
        log::info!(target: "kanbanx.sync", "Disconnected from Drive");
    }

    /// Disconnect and forget every token.
    pub async fn sign_out(&self) {
        self.disconnect().await;
        self.tokens.clear_all().await;
    }
}

fn granted<T>(access: Access<T>) -> Result<T, RemoteError> {
    match access {
        Access::Granted(value) => Ok(value),
        Access::Unavailable => Err(RemoteError::Unavailable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDrive, FakeTokens, FakeTransport};
    use kanbanx_core::engine::{add_board, add_card, rename_board, CardDraft};
    use kanbanx_core::storage::memory::MemoryStore;
    use kanbanx_core::storage::{KeyValueStore, STATE_KEY};
    use std::sync::atomic::Ordering;

    struct Fixture {
        area: Arc<MemoryStore>,
        drive: Arc<FakeDrive>,
        tokens: Arc<FakeTokens>,
        sync: SyncOrchestrator,
    }

    fn fixture() -> Fixture {
        let area = Arc::new(MemoryStore::new());
        let drive = Arc::new(FakeDrive::new());
        let tokens = Arc::new(FakeTokens::new());
        let sync = SyncOrchestrator::new(LocalStore::new(area.clone()), drive.clone(), tokens.clone());
        Fixture {
            area,
            drive,
            tokens,
            sync,
        }
    }

    async fn link(f: &Fixture, file_id: &str) {
        f.sync
            .store()
            .save_drive_settings(Some(&DriveSettings {
                file_id: Some(file_id.to_string()),
                connected_at: 1,
                last_synced_at: 1,
            }))
            .await;
    }

    fn named(name: &str) -> AppState {
        rename_board(&AppState::seeded(), "default", name)
    }

    #[tokio::test]
    async fn test_load_empty_means_seed() {
        let f = fixture();
        assert!(f.sync.load_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_prefers_remote_and_mirrors_it() {
        let f = fixture();
        f.sync.store().save_state(&named("Local")).await.unwrap();
        f.drive.insert("f1", named("Remote"));
        link(&f, "f1").await;

        let loaded = f.sync.load_state().await.unwrap().unwrap();
        assert_eq!(loaded.boards[0].name, "Remote");
        let local = f.sync.store().load_state().await.unwrap().unwrap();
        assert_eq!(local.boards[0].name, "Remote");
        assert_eq!(f.drive.calls(), vec![("read", RequestOptions::PASSIVE)]);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_local() {
        let f = fixture();
        f.sync.store().save_state(&named("Local")).await.unwrap();
        link(&f, "f1").await;

        // 404
        assert_eq!(f.sync.load_state().await.unwrap().unwrap().boards[0].name, "Local");

        // unparseable
        f.drive.insert("f1", named("Remote"));
        *f.drive.read_override.lock().unwrap() = Some(FakeTransport::ok(serde_json::json!({"boards": []})));
        assert_eq!(f.sync.load_state().await.unwrap().unwrap().boards[0].name, "Local");

        // no token
        *f.drive.read_override.lock().unwrap() = None;
        f.drive.unavailable.store(true, Ordering::SeqCst);
        assert_eq!(f.sync.load_state().await.unwrap().unwrap().boards[0].name, "Local");

        // server error
        f.drive.unavailable.store(false, Ordering::SeqCst);
        *f.drive.fail_status.lock().unwrap() = Some(500);
        assert_eq!(f.sync.load_state().await.unwrap().unwrap().boards[0].name, "Local");
    }

    #[tokio::test]
    async fn test_load_without_link_skips_remote() {
        let f = fixture();
        f.drive.insert("f1", named("Remote"));
        f.sync.store().save_state(&named("Local")).await.unwrap();
        assert_eq!(f.sync.load_state().await.unwrap().unwrap().boards[0].name, "Local");
        assert!(f.drive.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_masks_unreadable_local() {
        let f = fixture();
        f.area.set(STATE_KEY, serde_json::json!("garbage")).await.unwrap();
        f.drive.insert("f1", named("Remote"));
        link(&f, "f1").await;
        assert_eq!(f.sync.load_state().await.unwrap().unwrap().boards[0].name, "Remote");

        f.area.set(STATE_KEY, serde_json::json!("garbage")).await.unwrap();
        f.sync.disconnect().await;
        assert!(f.sync.load_state().await.is_err());
    }

    #[tokio::test]
    async fn test_save_not_connected() {
        let f = fixture();
        let state = AppState::seeded();
        assert_eq!(f.sync.save(&state).await.unwrap(), RemoteSync::NotConnected);
        assert_eq!(f.sync.store().load_state().await.unwrap(), Some(state));
        assert!(f.drive.calls().is_empty());
    }

    #[tokio::test]
    async fn test_save_updates_remote_and_sync_time() {
        let f = fixture();
        f.drive.insert("f1", named("Old"));
        link(&f, "f1").await;
        let state = named("New");
        assert_eq!(f.sync.save(&state).await.unwrap(), RemoteSync::Synced);
        assert_eq!(f.drive.file("f1"), Some(state));
        let settings = f.sync.drive_settings().await.unwrap();
        assert!(settings.last_synced_at > 1);
        assert_eq!(settings.connected_at, 1);
    }

    #[tokio::test]
    async fn test_save_recreates_missing_file_and_reuses_new_id() {
        let f = fixture();
        link(&f, "gone").await;

        let first = f.sync.save(&named("One")).await.unwrap();
        assert_eq!(
            first,
            RemoteSync::Recreated {
                file_id: "file-1".to_string()
            }
        );
        assert_eq!(f.sync.drive_settings().await.unwrap().file_id.as_deref(), Some("file-1"));

        assert_eq!(f.sync.save(&named("Two")).await.unwrap(), RemoteSync::Synced);
        assert_eq!(f.drive.file_count(), 1);
        assert_eq!(f.drive.file("file-1").unwrap().boards[0].name, "Two");
    }

    #[tokio::test]
    async fn test_save_local_failure_is_fatal() {
        let f = fixture();
        f.drive.insert("f1", named("Remote"));
        link(&f, "f1").await;
        f.area.fail_writes(true);
        assert!(f.sync.save(&named("New")).await.is_err());
        assert_eq!(f.drive.file("f1").unwrap().boards[0].name, "Remote");
    }

    #[tokio::test]
    async fn test_save_remote_failure_keeps_local() {
        let f = fixture();
        f.drive.insert("f1", named("Remote"));
        link(&f, "f1").await;
        *f.drive.fail_status.lock().unwrap() = Some(500);
        let outcome = f.sync.save(&named("New")).await.unwrap();
        assert!(matches!(outcome, RemoteSync::Failed(_)));
        assert_eq!(f.sync.store().load_state().await.unwrap().unwrap().boards[0].name, "New");
        assert_eq!(f.sync.drive_settings().await.unwrap().last_synced_at, 1);

        *f.drive.fail_status.lock().unwrap() = None;
        f.drive.unavailable.store(true, Ordering::SeqCst);
        assert_eq!(f.sync.save(&named("Newer")).await.unwrap(), RemoteSync::Unavailable);
    }

    #[tokio::test]
    async fn test_passive_paths_never_prompt() {
        let f = fixture();
        link(&f, "gone").await;
        f.sync.load_state().await.unwrap();
        f.sync.save(&AppState::seeded()).await.unwrap();
        assert!(!f.drive.calls().is_empty());
        assert!(f.drive.calls().iter().all(|(_, opts)| *opts == RequestOptions::PASSIVE));
    }

    #[tokio::test]
    async fn test_connect_creates_file() {
        let f = fixture();
        let state = named("Mine");
        let settings = f.sync.connect(&state).await.unwrap();
        assert_eq!(settings.file_id.as_deref(), Some("file-1"));
        assert_eq!(f.drive.file("file-1"), Some(state));
        assert_eq!(f.sync.drive_settings().await, Some(settings));
        assert!(f
            .drive
            .calls()
            .iter()
            .all(|(_, opts)| *opts == RequestOptions::INTERACTIVE));
    }

    #[tokio::test]
    async fn test_connect_adopts_existing_file() {
        let f = fixture();
        f.drive.insert("existing", named("Elsewhere"));
        let state = named("Mine");
        let settings = f.sync.connect(&state).await.unwrap();
        assert_eq!(settings.file_id.as_deref(), Some("existing"));
        assert_eq!(f.drive.file("existing"), Some(state));
        assert_eq!(f.drive.file_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_file_id_counts_as_not_connected() {
        let f = fixture();
        f.drive.insert("f1", named("Remote"));
        link(&f, "").await;

        let state = named("Local");
        assert_eq!(f.sync.save(&state).await.unwrap(), RemoteSync::NotConnected);
        assert_eq!(f.sync.load_state().await.unwrap(), Some(state));
        assert!(f.drive.calls().is_empty());
        assert_eq!(f.drive.file_count(), 1);

        // connect looks the file up instead of patching a blank id
        let settings = f.sync.connect(&AppState::seeded()).await.unwrap();
        assert_eq!(settings.file_id.as_deref(), Some("f1"));
        assert_eq!(f.drive.calls()[0], ("find", RequestOptions::INTERACTIVE));
    }

    #[tokio::test]
    async fn test_connect_replaces_stale_stored_id() {
        let f = fixture();
        link(&f, "gone").await;
        let settings = f.sync.connect(&AppState::seeded()).await.unwrap();
        assert_eq!(settings.file_id.as_deref(), Some("file-1"));
    }

    #[tokio::test]
    async fn test_connect_errors_surface() {
        let f = fixture();
        *f.drive.fail_status.lock().unwrap() = Some(403);
        let err = f.sync.connect(&AppState::seeded()).await.unwrap_err();
        assert!(matches!(err, SyncError::Connect(RemoteError::Status { status: 403, .. })));
        assert!(f.sync.drive_settings().await.is_none());

        let f = fixture();
        f.drive.insert("existing", AppState::seeded());
        link(&f, "existing").await;
        *f.drive.fail_status.lock().unwrap() = Some(500);
        let err = f.sync.connect(&AppState::seeded()).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Connect(RemoteError::Status {
                operation: "update",
                status: 500
            })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_and_sign_out() {
        let f = fixture();
        f.sync.connect(&AppState::seeded()).await.unwrap();
        f.sync.disconnect().await;
        assert!(f.sync.drive_settings().await.is_none());
        assert!(!f.tokens.was_cleared());
        assert_eq!(f.drive.file_count(), 1);

        f.sync.connect(&AppState::seeded()).await.unwrap();
        f.sync.sign_out().await;
        assert!(f.sync.drive_settings().await.is_none());
        assert!(f.tokens.was_cleared());
    }

    #[tokio::test]
    async fn test_concurrent_surfaces_last_writer_wins() {
        let f = fixture();
        let other = SyncOrchestrator::new(LocalStore::new(f.area.clone()), f.drive.clone(), f.tokens.clone());
        f.sync.connect(&AppState::seeded()).await.unwrap();

        let a = f.sync.load_state().await.unwrap().unwrap();
        let b = other.load_state().await.unwrap().unwrap();
        let a = add_board(&a, "From A");
        let b = add_card(&b, CardDraft::new("c1", "From B"));

        f.sync.save(&a).await.unwrap();
        other.save(&b).await.unwrap();

        let reloaded = f.sync.load_state().await.unwrap().unwrap();
        assert_eq!(reloaded, b);
        assert!(reloaded.boards.iter().all(|board| board.name != "From A"));
        assert_eq!(f.drive.file("file-1"), Some(b));
    }
}
