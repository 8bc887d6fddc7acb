//! Note storage

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{NotesError, Result};
use crate::model::NoteEntity;

/// Storage backing the notes store
///
/// Implementations are called from background tasks and must not touch
/// the store themselves.
#[async_trait]
pub trait NotesRepository: Send + Sync {
    /// All notes in insertion order
    async fn list(&self) -> Result<Vec<NoteEntity>>;

    /// Store a new note; fails if the id is taken
    async fn insert(&self, note: NoteEntity) -> Result<()>;

    /// Replace the text of an existing note
    async fn update(&self, note: NoteEntity) -> Result<()>;

    /// Remove a note; fails if it does not exist
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-process repository
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    notes: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    // seq -> note keeps insertion order across updates
    by_seq: BTreeMap<u64, NoteEntity>,
}

impl Inner {
    fn seq_of(&self, id: &str) -> Option<u64> {
        self.by_seq
            .iter()
            .find(|(_, note)| note.id == id)
            .map(|(seq, _)| *seq)
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(notes: impl IntoIterator<Item = NoteEntity>) -> Self {
        let mut inner = Inner::default();
        for note in notes {
            inner.by_seq.insert(inner.next_seq, note);
            inner.next_seq += 1;
        }
        Self {
            notes: Mutex::new(inner),
        }
    }
}

#[async_trait]
impl NotesRepository for InMemoryRepository {
    async fn list(&self) -> Result<Vec<NoteEntity>> {
        let inner = self.notes.lock().await;
        Ok(inner.by_seq.values().cloned().collect())
    }

    async fn insert(&self, note: NoteEntity) -> Result<()> {
        let mut inner = self.notes.lock().await;
        if inner.seq_of(&note.id).is_some() {
            return Err(NotesError::Repository(format!("note {} already exists", note.id)));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.by_seq.insert(seq, note);
        Ok(())
    }

    async fn update(&self, note: NoteEntity) -> Result<()> {
        let mut inner = self.notes.lock().await;
        let seq = inner
            .seq_of(&note.id)
            .ok_or_else(|| NotesError::Repository(format!("note {} not found", note.id)))?;
        inner.by_seq.insert(seq, note);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.notes.lock().await;
        let seq = inner
            .seq_of(id)
            .ok_or_else(|| NotesError::Repository(format!("note {} not found", id)))?;
        inner.by_seq.remove(&seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_list_in_order() {
        let repo = InMemoryRepository::new();

        repo.insert(NoteEntity::new("b", "second")).await.unwrap();
        repo.insert(NoteEntity::new("a", "first")).await.unwrap();

        let ids: Vec<_> = repo.list().await.unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_insert_duplicate_fails() {
        let repo = InMemoryRepository::with_notes([NoteEntity::new("1", "milk")]);

        let result = repo.insert(NoteEntity::new("1", "eggs")).await;

        assert!(matches!(result, Err(NotesError::Repository(_))));
        assert_eq!(repo.list().await.unwrap(), vec![NoteEntity::new("1", "milk")]);
    }

    #[tokio::test]
    async fn test_update_keeps_position() {
        let repo = InMemoryRepository::with_notes([NoteEntity::new("1", "milk"), NoteEntity::new("2", "eggs")]);

        repo.update(NoteEntity::new("1", "oat milk")).await.unwrap();

        assert_eq!(
            repo.list().await.unwrap(),
            vec![NoteEntity::new("1", "oat milk"), NoteEntity::new("2", "eggs")]
        );
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let repo = InMemoryRepository::new();

        let result = repo.update(NoteEntity::new("1", "milk")).await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "Repository error: note 1 not found"
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryRepository::with_notes([NoteEntity::new("1", "milk")]);

        repo.delete("1").await.unwrap();

        assert!(repo.list().await.unwrap().is_empty());
        assert!(repo.delete("1").await.is_err());
    }
}
