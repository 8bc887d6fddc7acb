//! Notes state

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntity {
    pub id: String,
    pub text: String,
}

impl NoteEntity {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// The open editor, if any
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Editor {
    pub text: String,
    /// Last save failure
    pub error: Option<String>,
    /// `None` while composing a new note
    pub note_id: Option<String>,
    pub is_saving: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesState {
    pub entities: Vec<NoteEntity>,
    /// When the notes were last loaded; `None` until the first load
    pub last_fetched: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub editor: Option<Editor>,
    /// Last load or delete failure
    pub error: Option<String>,
}

impl NotesState {
    pub fn note(&self, id: &str) -> Option<&NoteEntity> {
        self.entities.iter().find(|note| note.id == id)
    }

    /// Whether a load is due at `now`
    ///
    /// Never while a load is running; otherwise after a failure or once
    /// the notes are older than `ttl`.
    pub fn needs_load(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if self.is_loading {
            return false;
        }
        if self.error.is_some() {
            return true;
        }
        match self.last_fetched {
            // a timestamp from the future counts as fresh
            Some(fetched) => (now - fetched).to_std().map_or(false, |age| age > ttl),
            None => true,
        }
    }
}
