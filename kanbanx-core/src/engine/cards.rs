use chrono::{NaiveDate, SecondsFormat};

use crate::types::{AppState, AttachmentMeta, Board, Card, ChecklistItem};

use super::{active_board_mut, new_id, now_ms, with_state};

/// A card as submitted by a caller. Omitted fields get their defaults in
/// [`add_card`].
#[derive(Debug, Clone, Default)]
pub struct CardDraft {
    pub id: Option<String>,
    pub column_id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub selection: Option<String>,
    pub labels: Option<Vec<String>>,
    pub due_date: Option<String>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub attachments: Option<Vec<AttachmentMeta>>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub order: Option<f64>,
}

impl CardDraft {
    pub fn new(column_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn into_card(self, now: i64) -> Card {
        let created_at = self.created_at.unwrap_or(now);
        Card {
            id: self.id.unwrap_or_else(new_id),
            column_id: self.column_id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            url: self.url,
            selection: self.selection,
            labels: self.labels.unwrap_or_default(),
            due_date: self.due_date,
            checklist: self.checklist.unwrap_or_default(),
            attachments: self.attachments.unwrap_or_default(),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            order: self.order,
        }
    }
}

/// Shallow patch for [`patch_card`]. Outer `None` leaves a field alone;
/// for nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<Option<String>>,
    pub selection: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
    pub due_date: Option<Option<String>>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub attachments: Option<Vec<AttachmentMeta>>,
    pub order: Option<Option<f64>>,
}

impl CardPatch {
    fn apply(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(description) = &self.description {
            card.description = description.clone();
        }
        if let Some(url) = &self.url {
            card.url = url.clone();
        }
        if let Some(selection) = &self.selection {
            card.selection = selection.clone();
        }
        if let Some(labels) = &self.labels {
            card.labels = labels.clone();
        }
        if let Some(due_date) = &self.due_date {
            card.due_date = due_date.clone();
        }
        if let Some(checklist) = &self.checklist {
            card.checklist = checklist.clone();
        }
        if let Some(attachments) = &self.attachments {
            card.attachments = attachments.clone();
        }
        if let Some(order) = self.order {
            card.order = order;
        }
    }
}

/// Append a card to the active board. Drafts pointing at a column that is
/// not on the board, or reusing an existing card id, are ignored.
pub fn add_card(state: &AppState, draft: CardDraft) -> AppState {
    let now = now_ms();
    with_state(state, |next| {
        let Some(board) = active_board_mut(next) else {
            return;
        };
        if board.column(&draft.column_id).is_none() {
            log::debug!(
                target: "kanbanx.engine",
                "Ignoring card for unknown column {}",
                draft.column_id
            );
            return;
        }
        let card = draft.into_card(now);
        if board.card(&card.id).is_some() {
            return;
        }
        board.cards.push(card);
    })
}

/// Run `mutate` on a copy of the card and refresh its `updatedAt`.
pub fn update_card(state: &AppState, card_id: &str, mutate: impl FnOnce(&mut Card)) -> AppState {
    let now = now_ms();
    with_state(state, |next| {
        if let Some(card) = find_card_mut(next, card_id) {
            let previous = card.updated_at;
            mutate(card);
            card.updated_at = now.max(previous);
        }
    })
}

pub fn patch_card(state: &AppState, card_id: &str, patch: &CardPatch) -> AppState {
    update_card(state, card_id, |card| patch.apply(card))
}

/// Drop a card. Its attachment blobs are the caller's to delete.
pub fn remove_card(state: &AppState, card_id: &str) -> AppState {
    with_state(state, |next| {
        if let Some(board) = active_board_mut(next) {
            board.cards.retain(|c| c.id != card_id);
        }
    })
}

/// Reassign a card to another column. WIP limits are not checked here;
/// callers consult [`would_exceed_wip`] first.
pub fn move_card(state: &AppState, card_id: &str, to_column_id: &str) -> AppState {
    let known_column = super::active_board(state).is_some_and(|b| b.column(to_column_id).is_some());
    if !known_column {
        return state.clone();
    }
    update_card(state, card_id, |card| card.column_id = to_column_id.to_string())
}

pub fn column_card_count(board: &Board, column_id: &str, exclude_card_id: Option<&str>) -> usize {
    board
        .cards
        .iter()
        .filter(|c| c.column_id == column_id)
        .filter(|c| exclude_card_id != Some(c.id.as_str()))
        .count()
}

/// Whether putting one more card into the column breaks its WIP limit.
/// A card already in the column is not double counted when it is the one
/// being moved.
pub fn would_exceed_wip(board: &Board, column_id: &str, moving_card_id: Option<&str>) -> bool {
    match board.column(column_id).and_then(|c| c.wip) {
        Some(limit) => column_card_count(board, column_id, moving_card_id) + 1 > limit as usize,
        None => false,
    }
}

/// Cards of a column matching the search query, in display order.
pub fn visible_cards<'a>(board: &'a Board, column_id: &str, query: &str) -> Vec<&'a Card> {
    let query = query.trim().to_lowercase();
    let mut cards: Vec<&Card> = board
        .cards
        .iter()
        .filter(|c| c.column_id == column_id && matches_query(c, &query))
        .collect();
    cards.sort_by(|a, b| a.order.unwrap_or(0.0).total_cmp(&b.order.unwrap_or(0.0)));
    cards
}

fn matches_query(card: &Card, query: &str) -> bool {
    query.is_empty()
        || card.title.to_lowercase().contains(query)
        || card.description.to_lowercase().contains(query)
}

/// Parse a `YYYY-MM-DD` date input. Blank input means no due date.
pub fn parse_due_date(raw: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(Some)
}

fn find_card_mut<'a>(state: &'a mut AppState, card_id: &str) -> Option<&'a mut Card> {
    active_board_mut(state)?
        .cards
        .iter_mut()
        .find(|c| c.id == card_id)
}

/// Edits used from the card detail drawer, applied inside [`update_card`].
impl Card {
    /// Comma separated input; blanks are dropped.
    pub fn set_labels_from_input(&mut self, raw: &str) {
        self.labels = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    /// `YYYY-MM-DD` from a date input, stored as UTC midnight. Empty clears.
    pub fn set_due_date_from_input(&mut self, raw: &str) -> Result<(), chrono::ParseError> {
        self.set_due_date(parse_due_date(raw)?);
        Ok(())
    }

    /// Store a due date as ISO-8601 UTC midnight; `None` clears it.
    pub fn set_due_date(&mut self, date: Option<NaiveDate>) {
        self.due_date = date.map(|date| {
            date.and_time(chrono::NaiveTime::MIN)
                .and_utc()
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        });
    }

    pub fn add_checklist_item(&mut self, text: &str) -> String {
        let id = new_id();
        self.checklist.push(ChecklistItem {
            id: id.clone(),
            text: text.to_string(),
            done: false,
        });
        id
    }

    pub fn set_checklist_done(&mut self, item_id: &str, done: bool) {
        if let Some(item) = self.checklist.iter_mut().find(|i| i.id == item_id) {
            item.done = done;
        }
    }

    pub fn set_checklist_text(&mut self, item_id: &str, text: &str) {
        if let Some(item) = self.checklist.iter_mut().find(|i| i.id == item_id) {
            item.text = text.to_string();
        }
    }

    pub fn remove_checklist_item(&mut self, item_id: &str) {
        self.checklist.retain(|i| i.id != item_id);
    }

    pub fn add_attachment(&mut self, meta: AttachmentMeta) {
        self.attachments.push(meta);
    }

    pub fn remove_attachment(&mut self, attachment_id: &str) {
        self.attachments.retain(|a| a.id != attachment_id);
    }
}
