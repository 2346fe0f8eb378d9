use crate::types::{template_columns, AppState, Board};

use super::{new_id, with_state};

/// Create a board from the Backlog/Doing/Done template and make it active.
/// Empty names are ignored; callers validate before calling.
pub fn add_board(state: &AppState, name: &str) -> AppState {
    let name = name.trim();
    if name.is_empty() {
        return state.clone();
    }
    with_state(state, |next| {
        let board = Board {
            id: new_id(),
            name: name.to_string(),
            labels: Vec::new(),
            columns: template_columns(|_| new_id()),
            cards: Vec::new(),
        };
        log::debug!(target: "kanbanx.engine", "Adding board {} ({})", board.name, board.id);
        next.active_board_id = board.id.clone();
        next.boards.push(board);
    })
}

pub fn rename_board(state: &AppState, board_id: &str, name: &str) -> AppState {
    let name = name.trim();
    if name.is_empty() {
        return state.clone();
    }
    with_state(state, |next| {
        if let Some(board) = next.boards.iter_mut().find(|b| b.id == board_id) {
            board.name = name.to_string();
        }
    })
}

/// Remove a board. The last remaining board is never removed.
pub fn remove_board(state: &AppState, board_id: &str) -> AppState {
    if state.boards.len() <= 1 || state.board(board_id).is_none() {
        return state.clone();
    }
    with_state(state, |next| {
        next.boards.retain(|b| b.id != board_id);
        if next.active_board_id == board_id {
            next.active_board_id = next.boards[0].id.clone();
        }
    })
}

pub fn set_active_board(state: &AppState, board_id: &str) -> AppState {
    if state.board(board_id).is_none() {
        return state.clone();
    }
    with_state(state, |next| next.active_board_id = board_id.to_string())
}
