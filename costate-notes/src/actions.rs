//! Messages understood by the notes store

use chrono::{DateTime, Utc};

use crate::model::NoteEntity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    LoadNotes,
    NotesLoaded {
        fetched_at: DateTime<Utc>,
        notes: Vec<NoteEntity>,
    },
    FailedToLoadNotes(String),

    EditNote {
        note_id: String,
    },
    CancelEdit,
    UpdateEditorText(String),
    NewNote,
    SaveEdit,
    OnSaveSuccessful(NoteEntity),
    OnNoteAdded(NoteEntity),
    OnSaveFailed(String),

    DeleteNote(String),
    OnDeleteFailed(String),

    DismissError,
}
