/// Export and import of the whole board state as a JSON file.
use crate::migrate;
use crate::types::AppState;

pub const EXPORT_FILE_NAME: &str = "kanbanx-export.json";

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Invalid board file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Board file contains no boards")]
    NoBoards,
}

/// Pretty-printed JSON of the full state.
pub fn export_state(state: &AppState) -> Result<String, TransferError> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Parse an exported file. The result replaces the current state wholesale;
/// on error the caller keeps its current state.
pub fn import_state(text: &str) -> Result<AppState, TransferError> {
    let state: AppState = serde_json::from_str(text)?;
    migrate::migrate(state)
}
