use crate::types::{AppState, Board, Column};

use super::{active_board_mut, with_state};

/// Stable-sort by `order` (ties keep array position), then reassign
/// `order = index`. Repairs gaps and duplicates left by older data.
pub fn normalize_columns(columns: &mut [Column]) {
    columns.sort_by_key(|c| c.order);
    for (index, column) in columns.iter_mut().enumerate() {
        column.order = index as i64;
    }
}

/// Columns in display order without touching the board.
pub fn sorted_columns(board: &Board) -> Vec<&Column> {
    let mut columns: Vec<&Column> = board.columns.iter().collect();
    columns.sort_by_key(|c| c.order);
    columns
}

/// Coerce free-form limit input. Anything that is not a finite,
/// non-negative number means unlimited.
pub fn parse_wip_limit(raw: &str) -> Option<u32> {
    let n = raw.trim().parse::<f64>().ok()?;
    if n.is_finite() && n >= 0.0 {
        Some(n.floor().min(u32::MAX as f64) as u32)
    } else {
        None
    }
}

/// Insert a column as the leftmost column of the active board. The
/// caller-supplied `order` is ignored, and a column reusing an existing id
/// is ignored too.
pub fn add_column(state: &AppState, column: Column) -> AppState {
    with_state(state, |next| {
        let Some(board) = active_board_mut(next) else {
            return;
        };
        if board.column(&column.id).is_some() {
            log::debug!(target: "kanbanx.engine", "Ignoring duplicate column id {}", column.id);
            return;
        }
        normalize_columns(&mut board.columns);
        board.columns.insert(0, column);
        for (index, column) in board.columns.iter_mut().enumerate() {
            column.order = index as i64;
        }
    })
}

pub fn rename_column(state: &AppState, column_id: &str, name: &str) -> AppState {
    with_state(state, |next| {
        if let Some(column) = find_column_mut(next, column_id) {
            column.name = name.to_string();
        }
    })
}

/// Set a WIP limit from raw user input; see [`parse_wip_limit`].
pub fn set_column_limit(state: &AppState, column_id: &str, raw: &str) -> AppState {
    let limit = parse_wip_limit(raw);
    with_state(state, |next| {
        if let Some(column) = find_column_mut(next, column_id) {
            column.wip = limit;
        }
    })
}

/// Remove a column and every card in it. A board's only column stays.
pub fn remove_column(state: &AppState, column_id: &str) -> AppState {
    let Some(board) = super::active_board(state) else {
        return state.clone();
    };
    if board.columns.len() <= 1 || board.column(column_id).is_none() {
        return state.clone();
    }
    with_state(state, |next| {
        if let Some(board) = active_board_mut(next) {
            board.columns.retain(|c| c.id != column_id);
            let before = board.cards.len();
            board.cards.retain(|c| c.column_id != column_id);
            log::debug!(
                target: "kanbanx.engine",
                "Removed column {} with {} cards",
                column_id,
                before - board.cards.len()
            );
            normalize_columns(&mut board.columns);
        }
    })
}

/// Shift a column left (negative offset) or right (positive offset).
pub fn move_column(state: &AppState, column_id: &str, offset: i64) -> AppState {
    let Some(board) = super::active_board(state) else {
        return state.clone();
    };
    if board.columns.len() < 2 {
        return state.clone();
    }
    let sorted = sorted_columns(board);
    let Some(index) = sorted.iter().position(|c| c.id == column_id) else {
        return state.clone();
    };
    let target = index as i64 + offset;
    if target < 0 || target >= sorted.len() as i64 {
        return state.clone();
    }
    with_state(state, |next| {
        if let Some(board) = active_board_mut(next) {
            normalize_columns(&mut board.columns);
            let column = board.columns.remove(index);
            board.columns.insert(target as usize, column);
            for (index, column) in board.columns.iter_mut().enumerate() {
                column.order = index as i64;
            }
        }
    })
}

fn find_column_mut<'a>(state: &'a mut AppState, column_id: &str) -> Option<&'a mut Column> {
    active_board_mut(state)?
        .columns
        .iter_mut()
        .find(|c| c.id == column_id)
}
