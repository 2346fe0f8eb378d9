/// Configuration for KanbanX.
/// Reads config.json from ~/.config/kanbanx/config.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Client id shipped in templates; a config still carrying it has not been
/// set up for Drive.
pub const PLACEHOLDER_CLIENT_ID: &str = "YOUR_GOOGLE_CLIENT_ID.apps.googleusercontent.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanxConfig {
    /// Where board state and attachments live. Defaults to the platform
    /// data directory.
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub drive: DriveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

fn default_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_client_id() -> String {
    PLACEHOLDER_CLIENT_ID.to_string()
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_url: default_token_url(),
            client_id: default_client_id(),
            client_secret: None,
        }
    }
}

impl DriveConfig {
    pub fn is_configured(&self) -> bool {
        let id = self.client_id.trim();
        !id.is_empty() && id != PLACEHOLDER_CLIENT_ID
    }
}

impl KanbanxConfig {
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("kanbanx"),
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir().join("store")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir().join("attachments")
    }
}

/// Default config path: ~/.config/kanbanx/config.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kanbanx")
        .join("config.json")
}

/// Load config from path. Returns default if file doesn't exist.
pub fn load_config(path: &Path) -> KanbanxConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(target: "kanbanx.config", "Failed to parse config {}: {}", path.display(), e);
            KanbanxConfig::default()
        }),
        Err(_) => {
            log::info!(target: "kanbanx.config", "No config at {}, using defaults", path.display());
            KanbanxConfig::default()
        }
    }
}
