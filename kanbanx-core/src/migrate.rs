/// Load-time schema migration.
///
/// Runs once whenever a stored document enters the system (local load,
/// remote read, import). Field-level backfill is handled by the serde
/// defaults on the data model; this pass repairs the structural invariants
/// the engine relies on afterwards.
use crate::engine::normalize_columns;
use crate::transfer::TransferError;
use crate::types::{AppState, CURRENT_VERSION};

pub fn migrate(mut state: AppState) -> Result<AppState, TransferError> {
    if state.boards.is_empty() {
        return Err(TransferError::NoBoards);
    }

    if state.version < CURRENT_VERSION {
        log::info!(
            target: "kanbanx.migrate",
            "Upgrading state from version {} to {}",
            state.version,
            CURRENT_VERSION
        );
        state.version = CURRENT_VERSION;
    }

    for board in &mut state.boards {
        normalize_columns(&mut board.columns);
    }

    if state.board(&state.active_board_id).is_none() {
        log::warn!(
            target: "kanbanx.migrate",
            "Active board {} missing, falling back to {}",
            state.active_board_id,
            state.boards[0].id
        );
        state.active_board_id = state.boards[0].id.clone();
    }

    Ok(state)
}

/// Parse a stored JSON value into a migrated [`AppState`].
pub fn from_value(value: serde_json::Value) -> Result<AppState, TransferError> {
    let state: AppState = serde_json::from_value(value)?;
    migrate(state)
}
