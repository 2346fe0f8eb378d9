use serde::{Deserialize, Serialize};

/// Schema version written by this crate. Older documents are raised to it
/// by [`crate::migrate::migrate`].
pub const CURRENT_VERSION: u32 = 1;

pub const DEFAULT_BOARD_ID: &str = "default";
pub const DEFAULT_BOARD_NAME: &str = "My Board";

/// The complete persisted snapshot: every board, settings, and UI state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub version: u32,
    pub boards: Vec<Board>,
    pub active_board_id: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub ui: UiState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub compact: bool,
}

/// Partial settings update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub name: String,
    /// `None` means unlimited.
    #[serde(default)]
    pub wip: Option<u32>,
    /// Left-to-right position, dense `0..N-1` after normalization.
    #[serde(default)]
    pub order: i64,
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>, wip: Option<u32>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            wip,
            order: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub column_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// ISO-8601 timestamp.
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    /// Secondary sort key within a column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// Attachment metadata kept on the card. The payload lives in a
/// [`crate::attachments::BlobStore`] under the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: i64,
}

/// Remote sync metadata, persisted apart from [`AppState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveSettings {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub connected_at: i64,
    #[serde(default)]
    pub last_synced_at: i64,
}

impl DriveSettings {
    pub fn is_connected(&self) -> bool {
        self.linked_file_id().is_some()
    }

    /// The remote file id, unless it is missing or blank.
    pub fn linked_file_id(&self) -> Option<&str> {
        self.file_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// The three columns every new board starts with.
pub fn template_columns(mut make_id: impl FnMut(usize) -> String) -> Vec<Column> {
    [("Backlog", None), ("Doing", Some(2)), ("Done", None)]
        .into_iter()
        .enumerate()
        .map(|(index, (name, wip))| Column {
            id: make_id(index),
            name: name.to_string(),
            wip,
            order: index as i64,
        })
        .collect()
}

impl AppState {
    /// The state seeded on first run.
    pub fn seeded() -> Self {
        Self {
            version: CURRENT_VERSION,
            boards: vec![Board {
                id: DEFAULT_BOARD_ID.to_string(),
                name: DEFAULT_BOARD_NAME.to_string(),
                labels: Vec::new(),
                columns: template_columns(|i| format!("c{}", i + 1)),
                cards: Vec::new(),
            }],
            active_board_id: DEFAULT_BOARD_ID.to_string(),
            settings: Settings::default(),
            ui: UiState::default(),
        }
    }

    pub fn board(&self, board_id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == board_id)
    }
}

impl Board {
    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }
}
