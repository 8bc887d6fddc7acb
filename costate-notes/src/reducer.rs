//! Pure state transitions for the notes store

use crate::actions::Action;
use crate::model::{Editor, NotesState};

pub fn reduce(state: NotesState, action: &Action) -> NotesState {
    match action {
        Action::LoadNotes => NotesState {
            is_loading: true,
            ..state
        },
        Action::NotesLoaded { fetched_at, notes } => NotesState {
            entities: notes.clone(),
            last_fetched: Some(*fetched_at),
            is_loading: false,
            error: None,
            ..state
        },
        Action::FailedToLoadNotes(error) => NotesState {
            is_loading: false,
            error: Some(error.clone()),
            ..state
        },

        Action::EditNote { note_id } => {
            if state.editor.is_some() {
                return state;
            }
            let editor = state.note(note_id).map(|note| Editor {
                text: note.text.clone(),
                note_id: Some(note.id.clone()),
                ..Editor::default()
            });
            match editor {
                Some(editor) => NotesState {
                    editor: Some(editor),
                    ..state
                },
                None => state,
            }
        }
        Action::CancelEdit => NotesState {
            editor: None,
            ..state
        },
        Action::UpdateEditorText(text) => map_editor(state, |editor| Editor {
            text: text.clone(),
            ..editor
        }),
        Action::NewNote => {
            if state.editor.is_some() {
                state
            } else {
                NotesState {
                    editor: Some(Editor::default()),
                    ..state
                }
            }
        }
        Action::SaveEdit => map_editor(state, |editor| Editor {
            is_saving: true,
            ..editor
        }),
        Action::OnSaveSuccessful(saved) => {
            let entities = state
                .entities
                .into_iter()
                .map(|note| if note.id == saved.id { saved.clone() } else { note })
                .collect();
            NotesState {
                entities,
                editor: None,
                ..state
            }
        }
        Action::OnNoteAdded(note) => {
            let mut entities = state.entities;
            entities.push(note.clone());
            NotesState {
                entities,
                editor: None,
                ..state
            }
        }
        Action::OnSaveFailed(error) => map_editor(state, |editor| Editor {
            is_saving: false,
            error: Some(error.clone()),
            ..editor
        }),

        Action::DeleteNote(note_id) => {
            let mut entities = state.entities;
            entities.retain(|note| &note.id != note_id);
            let editor = state
                .editor
                .filter(|editor| editor.note_id.as_ref() != Some(note_id));
            NotesState {
                entities,
                editor,
                ..state
            }
        }
        Action::OnDeleteFailed(error) => NotesState {
            error: Some(error.clone()),
            ..state
        },

        Action::DismissError => NotesState {
            error: None,
            ..state
        },
    }
}

fn map_editor(state: NotesState, f: impl FnOnce(Editor) -> Editor) -> NotesState {
    NotesState {
        editor: state.editor.map(f),
        ..state
    }
}
