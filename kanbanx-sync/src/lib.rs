//! KanbanX sync layer: Drive mirror, token provider, sync orchestration and
//! the session facade used by the `kanbanx` binary.

pub mod auth;
pub mod config;
pub mod drive;
pub mod log_bridge;
pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use kanbanx_core::attachments::FileBlobStore;
use kanbanx_core::storage::file::FileStore;
use kanbanx_core::storage::{KeyValueStore, LocalStore};

use crate::auth::OAuthTokenProvider;
use crate::config::KanbanxConfig;
use crate::drive::{DriveClient, ReqwestTransport};
use crate::orchestrator::SyncOrchestrator;
use crate::session::{Session, SessionError};

/// A session wired to the file-backed stores and the real Drive API.
pub struct App {
    pub session: Session,
    pub tokens: Arc<OAuthTokenProvider>,
}

pub async fn open_app(config: &KanbanxConfig) -> Result<App, SessionError> {
    let area: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.store_dir())?);
    let blobs = Arc::new(FileBlobStore::new(config.attachments_dir())?);
    let tokens = Arc::new(OAuthTokenProvider::new(config.drive.clone(), area.clone()));
    let drive = Arc::new(DriveClient::new(
        config.drive.api_base.clone(),
        Arc::new(ReqwestTransport::new()),
        tokens.clone(),
    ));

    log::debug!(target: "kanbanx.config", "Data directory {}", config.data_dir().display());
    let sync = SyncOrchestrator::new(LocalStore::new(area), drive, tokens.clone());
    let session = Session::open(sync, blobs).await?;
    Ok(App { session, tokens })
}
