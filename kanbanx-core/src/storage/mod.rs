pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::migrate;
use crate::transfer::TransferError;
use crate::types::{AppState, DriveSettings, Settings};

/// Board state blob.
pub const STATE_KEY: &str = "kanban.v1";
/// `{theme, compact}` subset kept in the synced area.
pub const SETTINGS_KEY: &str = "kanban.settings.v1";
/// Remote file id and sync timestamps.
pub const DRIVE_SETTINGS_KEY: &str = "kanban.drive.settings.v1";
/// OAuth refresh token for the remote store.
pub const DRIVE_CREDENTIALS_KEY: &str = "kanban.drive.credentials.v1";

/// Abstract key-value backend.
/// Implementations: FileStore (one JSON document per key), MemoryStore.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Stored state is invalid: {0}")]
    InvalidState(#[from] TransferError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Typed access to the application's keys.
///
/// `area` is the durable private store. `synced_area` receives the small
/// settings blob and may be the same store when the platform has no
/// separate synced area.
#[derive(Clone)]
pub struct LocalStore {
    area: Arc<dyn KeyValueStore>,
    synced_area: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(area: Arc<dyn KeyValueStore>) -> Self {
        Self {
            synced_area: area.clone(),
            area,
        }
    }

    pub fn with_synced_area(area: Arc<dyn KeyValueStore>, synced_area: Arc<dyn KeyValueStore>) -> Self {
        Self { area, synced_area }
    }

    pub fn area(&self) -> &Arc<dyn KeyValueStore> {
        &self.area
    }

    /// Read and migrate the stored board state, if any.
    pub async fn load_state(&self) -> Result<Option<AppState>, StoreError> {
        match self.area.get(STATE_KEY).await? {
            Some(value) => Ok(Some(migrate::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn save_state(&self, state: &AppState) -> Result<(), StoreError> {
        self.area.set(STATE_KEY, serde_json::to_value(state)?).await
    }

    /// Best effort: failures are logged and reported as `None`.
    pub async fn load_settings(&self) -> Option<Settings> {
        match self.synced_area.get(SETTINGS_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value)
                .map_err(|e| log::warn!(target: "kanbanx.storage", "Ignoring stored settings: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                log::warn!(target: "kanbanx.storage", "Unable to read synced settings: {}", e);
                None
            }
        }
    }

    /// Best effort: failures are logged and swallowed.
    pub async fn save_settings(&self, settings: &Settings) {
        let result = match serde_json::to_value(settings) {
            Ok(value) => self.synced_area.set(SETTINGS_KEY, value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            log::warn!(target: "kanbanx.storage", "Unable to persist synced settings: {}", e);
        }
    }

    /// Best effort: unreadable settings count as "not connected".
    pub async fn load_drive_settings(&self) -> Option<DriveSettings> {
        match self.area.get(DRIVE_SETTINGS_KEY).await {
            Ok(Some(Value::Null)) | Ok(None) => None,
            Ok(Some(value)) => serde_json::from_value(value)
                .map_err(|e| log::warn!(target: "kanbanx.storage", "Ignoring Drive settings: {}", e))
                .ok(),
            Err(e) => {
                log::warn!(target: "kanbanx.storage", "Unable to read Drive settings: {}", e);
                None
            }
        }
    }

    /// Best effort: `None` clears the settings.
    pub async fn save_drive_settings(&self, settings: Option<&DriveSettings>) {
        let result = match settings {
            Some(settings) => match serde_json::to_value(settings) {
                Ok(value) => self.area.set(DRIVE_SETTINGS_KEY, value).await,
                Err(e) => Err(e.into()),
            },
            None => self.area.remove(DRIVE_SETTINGS_KEY).await,
        };
        if let Err(e) = result {
            log::warn!(target: "kanbanx.storage", "Unable to persist Drive settings: {}", e);
        }
    }
}
