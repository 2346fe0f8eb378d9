/// Quick-add entry points: the page context menu and the toolbar popup.
///
/// Both create a card in the first column of the active board and decline
/// when that column is at its WIP limit.
use crate::engine::{self, add_card, sorted_columns, would_exceed_wip, CardDraft};
use crate::types::AppState;

const MAX_SELECTION_TITLE_CHARS: usize = 120;
const FALLBACK_TITLE: &str = "New card";

/// What the user captured and from where.
#[derive(Debug, Clone, PartialEq)]
pub enum Capture {
    /// "Add to KanbanX" on a page or a text selection.
    ContextMenu {
        selection: Option<String>,
        page_title: Option<String>,
        page_url: Option<String>,
    },
    /// The popup form on the current tab.
    Popup {
        title: String,
        tab_title: Option<String>,
        tab_url: Option<String>,
        attach_url: bool,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("Cannot add card. \"{column}\" is at its WIP limit.")]
    WipLimitReached { column: String, limit: u32 },

    #[error("Active board has no columns")]
    NoColumn,
}

impl Capture {
    fn title(&self) -> String {
        match self {
            Capture::ContextMenu {
                selection,
                page_title,
                ..
            } => non_empty(selection.as_deref())
                .map(|s| s.chars().take(MAX_SELECTION_TITLE_CHARS).collect::<String>())
                .or_else(|| non_empty(page_title.as_deref()).map(str::to_string))
                .unwrap_or_else(|| FALLBACK_TITLE.to_string()),
            Capture::Popup {
                title, tab_title, ..
            } => non_empty(Some(title.trim()))
                .or_else(|| non_empty(tab_title.as_deref()))
                .unwrap_or(FALLBACK_TITLE)
                .to_string(),
        }
    }

    fn url(&self) -> Option<String> {
        match self {
            Capture::ContextMenu { page_url, .. } => non_empty(page_url.as_deref()).map(str::to_string),
            Capture::Popup {
                tab_url,
                attach_url,
                ..
            } => (*attach_url)
                .then(|| non_empty(tab_url.as_deref()).map(str::to_string))
                .flatten(),
        }
    }

    fn selection(&self) -> Option<String> {
        match self {
            Capture::ContextMenu { selection, .. } => non_empty(selection.as_deref()).map(str::to_string),
            Capture::Popup { .. } => None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Add the captured card, or explain why it was declined.
pub fn quick_add(state: &AppState, capture: &Capture) -> Result<AppState, CaptureError> {
    let board = engine::active_board(state).ok_or(CaptureError::NoColumn)?;
    let column = sorted_columns(board)
        .into_iter()
        .next()
        .ok_or(CaptureError::NoColumn)?;

    if would_exceed_wip(board, &column.id, None) {
        log::info!(
            target: "kanbanx.capture",
            "Declined quick-add, column {} is full",
            column.name
        );
        return Err(CaptureError::WipLimitReached {
            column: column.name.clone(),
            limit: column.wip.unwrap_or_default(),
        });
    }

    let draft = CardDraft {
        url: capture.url(),
        selection: capture.selection(),
        labels: Some(Vec::new()),
        ..CardDraft::new(column.id.clone(), capture.title())
    };
    Ok(add_card(state, draft))
}
