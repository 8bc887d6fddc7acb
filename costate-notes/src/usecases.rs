//! Action creators driving the notes store

use std::time::Duration;

use chrono::Utc;
use libcostate::CreatorDispatch;
use tracing::{debug, warn};

use crate::actions::Action;
use crate::model::NotesState;

/// Reload notes when they are stale or the last load failed
///
/// The condition is checked again when the `LoadNotes` action is
/// evaluated, so queued duplicates collapse into one load.
pub fn load_notes(ttl: Duration) -> impl FnOnce(&NotesState, CreatorDispatch<NotesState, Action>) {
    move |state: &NotesState, dispatch: CreatorDispatch<NotesState, Action>| {
        if !state.needs_load(Utc::now(), ttl) {
            debug!("Notes are fresh, skipping load");
            return;
        }
        let result = dispatch.dispatch(move |state: &NotesState| {
            state
                .needs_load(Utc::now(), ttl)
                .then_some(Action::LoadNotes)
        });
        if let Err(e) = result {
            warn!("Failed to request notes: {}", e);
        }
    }
}

/// Open the editor on `note_id` unless another edit is in progress
pub fn edit_note(note_id: impl Into<String>) -> impl FnOnce(&NotesState) -> Option<Action> + Send + 'static {
    let note_id = note_id.into();
    move |state: &NotesState| {
        if state.editor.is_some() || state.note(&note_id).is_none() {
            return None;
        }
        Some(Action::EditNote { note_id })
    }
}
