/// Pure state transitions over [`AppState`].
///
/// Every operation borrows its input and returns a new owned snapshot; the
/// input is never modified. Operations targeting an id that no longer exists
/// return an unchanged copy, since another surface may have deleted it.
///
/// - `boards`: board lifecycle and the active board
/// - `columns`: column edits and order normalization
/// - `cards`: card edits, moves, and the capacity queries
pub mod boards;
pub mod cards;
pub mod columns;

pub use boards::*;
pub use cards::*;
pub use columns::*;

use crate::types::{AppState, Board, SettingsPatch};

/// Wall clock in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fresh unique id for boards, columns, cards, and checklist items.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Copy the state and apply an arbitrary edit to the copy.
pub fn with_state(state: &AppState, edit: impl FnOnce(&mut AppState)) -> AppState {
    let mut next = state.clone();
    edit(&mut next);
    next
}

pub fn active_board(state: &AppState) -> Option<&Board> {
    state.board(&state.active_board_id)
}

pub(crate) fn active_board_mut(state: &mut AppState) -> Option<&mut Board> {
    let active = state.active_board_id.clone();
    state.boards.iter_mut().find(|b| b.id == active)
}

/// Shallow-merge a settings patch.
pub fn update_settings(state: &AppState, patch: &SettingsPatch) -> AppState {
    with_state(state, |next| {
        if let Some(theme) = patch.theme {
            next.settings.theme = theme;
        }
        if let Some(compact) = patch.compact {
            next.settings.compact = compact;
        }
    })
}

/// Set the search query shown in the board header.
pub fn set_query(state: &AppState, query: &str) -> AppState {
    with_state(state, |next| next.ui.query = query.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Theme;

    #[test]
    fn test_update_settings_merges_shallowly() {
        let state = AppState::seeded();
        let next = update_settings(
            &state,
            &SettingsPatch {
                theme: Some(Theme::Light),
                compact: None,
            },
        );
        assert_eq!(next.settings.theme, Theme::Light);
        assert!(!next.settings.compact);
        // input untouched
        assert_eq!(state.settings.theme, Theme::Dark);
    }

    #[test]
    fn test_set_query() {
        let state = AppState::seeded();
        let next = set_query(&state, "bug");
        assert_eq!(next.ui.query, "bug");
        assert_eq!(state.ui.query, "");
    }

    #[test]
    fn test_active_board_resolves() {
        let state = AppState::seeded();
        assert_eq!(active_board(&state).map(|b| b.id.as_str()), Some("default"));
    }
}
