/// Attachment payload storage, kept outside the board state.
///
/// Cards only carry [`AttachmentMeta`]; the bytes live here under the
/// same id. The state engine never touches this store, so callers delete
/// blobs for cards and columns they remove (see [`orphaned_attachment_ids`]).
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::engine::{new_id, now_ms};
use crate::media::resolve_content_type;
use crate::storage::file::atomic_write;
use crate::types::{AppState, AttachmentMeta};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt attachment metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Invalid attachment id: {0}")]
    InvalidId(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a payload and return the metadata to put on the card.
    async fn put(&self, name: &str, content_type: &str, bytes: &[u8]) -> Result<AttachmentMeta, BlobError>;

    async fn get(&self, id: &str) -> Result<Option<(AttachmentMeta, Vec<u8>)>, BlobError>;

    /// Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), BlobError>;
}

/// Blobs as `<id>.bin` with a `<id>.meta.json` sidecar.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn paths(&self, id: &str) -> Result<(PathBuf, PathBuf), BlobError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(BlobError::InvalidId(id.to_string()));
        }
        Ok((
            self.dir.join(format!("{}.bin", id)),
            self.dir.join(format!("{}.meta.json", id)),
        ))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, name: &str, content_type: &str, bytes: &[u8]) -> Result<AttachmentMeta, BlobError> {
        let meta = AttachmentMeta {
            id: new_id(),
            name: name.to_string(),
            content_type: resolve_content_type(name, content_type),
            size: bytes.len() as u64,
            created_at: now_ms(),
        };
        let (blob_path, meta_path) = self.paths(&meta.id)?;
        atomic_write(&blob_path, bytes)?;
        atomic_write(&meta_path, &serde_json::to_vec(&meta)?)?;
        log::debug!(target: "kanbanx.attachments", "Stored {} ({} bytes)", meta.id, meta.size);
        Ok(meta)
    }

    async fn get(&self, id: &str) -> Result<Option<(AttachmentMeta, Vec<u8>)>, BlobError> {
        let (blob_path, meta_path) = self.paths(id)?;
        let meta = match fs::read(&meta_path) {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match fs::read(&blob_path) {
            Ok(bytes) => Ok(Some((meta, bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), BlobError> {
        let (blob_path, meta_path) = self.paths(id)?;
        for path in [blob_path, meta_path] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Every attachment id referenced by any card on any board.
pub fn referenced_attachment_ids(state: &AppState) -> HashSet<&str> {
    state
        .boards
        .iter()
        .flat_map(|b| b.cards.iter())
        .flat_map(|c| c.attachments.iter())
        .map(|a| a.id.as_str())
        .collect()
}

/// Attachment ids referenced in `before` but no longer in `after`: the
/// blobs to delete after removing cards, columns, boards, or attachments.
pub fn orphaned_attachment_ids(before: &AppState, after: &AppState) -> Vec<String> {
    let still_used = referenced_attachment_ids(after);
    let mut orphaned: Vec<String> = referenced_attachment_ids(before)
        .into_iter()
        .filter(|id| !still_used.contains(id))
        .map(str::to_string)
        .collect();
    orphaned.sort();
    orphaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{add_card, remove_column, update_card, CardDraft};

    fn meta(id: &str) -> AttachmentMeta {
        AttachmentMeta {
            id: id.to_string(),
            name: format!("{}.txt", id),
            content_type: "text/plain".into(),
            size: 1,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        let meta = store.put("photo.png", "", b"\x89PNG").await.unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.size, 4);

        let (stored, bytes) = store.get(&meta.id).await.unwrap().unwrap();
        assert_eq!(stored, meta);
        assert_eq!(bytes, b"\x89PNG");

        store.delete(&meta.id).await.unwrap();
        assert!(store.get(&meta.id).await.unwrap().is_none());
        store.delete(&meta.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        assert!(matches!(store.get("../x").await, Err(BlobError::InvalidId(_))));
    }

    #[test]
    fn test_orphans_after_column_cascade() {
        let state = AppState::seeded();
        let state = add_card(&state, CardDraft::new("c1", "keep").with_id("a"));
        let state = add_card(&state, CardDraft::new("c2", "drop").with_id("b"));
        let state = update_card(&state, "a", |c| c.add_attachment(meta("x1")));
        let state = update_card(&state, "b", |c| {
            c.add_attachment(meta("y1"));
            c.add_attachment(meta("y2"));
        });
        let after = remove_column(&state, "c2");
        assert_eq!(orphaned_attachment_ids(&state, &after), vec!["y1", "y2"]);
        assert!(orphaned_attachment_ids(&state, &state).is_empty());
    }
}
