//! Board state model and pure state transitions for KanbanX, plus the
//! local persistence it is stored with.

pub mod attachments;
pub mod capture;
pub mod engine;
pub mod media;
pub mod migrate;
pub mod storage;
pub mod transfer;
pub mod types;
