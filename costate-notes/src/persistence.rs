//! Middleware persisting note changes
//!
//! `NotesPersistence` lets every message reach the reducer first, then
//! performs the matching repository call on a background task and reports
//! the outcome with a follow-up action.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use libcostate::{Dispatcher, Middleware, Next, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::actions::Action;
use crate::model::{NoteEntity, NotesState};
use crate::repository::NotesRepository;

/// Repository work triggered by a message
#[derive(Debug, Clone, PartialEq, Eq)]
enum Effect {
    Load,
    Insert(NoteEntity),
    Update(NoteEntity),
    Delete(String),
}

impl Effect {
    /// Decide on the state the message was dispatched against
    fn plan(state: &NotesState, action: &Action) -> Option<Self> {
        match action {
            Action::LoadNotes if !state.is_loading => Some(Effect::Load),
            Action::SaveEdit => {
                let editor = state.editor.as_ref().filter(|editor| !editor.is_saving)?;
                Some(match &editor.note_id {
                    Some(id) => Effect::Update(NoteEntity::new(id.clone(), editor.text.clone())),
                    None => Effect::Insert(NoteEntity::new(Uuid::new_v4().to_string(), editor.text.clone())),
                })
            }
            Action::DeleteNote(id) if state.note(id).is_some() => Some(Effect::Delete(id.clone())),
            _ => None,
        }
    }
}

pub struct NotesPersistence {
    repository: Arc<dyn NotesRepository>,
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotesPersistence {
    pub fn new(repository: Arc<dyn NotesRepository>, runtime: Handle) -> Self {
        Self {
            repository,
            runtime,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Number of repository calls still running
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.len()
    }

    fn spawn(&self, effect: Effect, dispatcher: Dispatcher<Action>) {
        let repository = Arc::clone(&self.repository);
        debug!(effect = ?effect, "Starting repository call");

        let task = self.runtime.spawn(async move {
            let follow_up = match effect {
                Effect::Load => match repository.list().await {
                    Ok(notes) => Action::NotesLoaded {
                        fetched_at: Utc::now(),
                        notes,
                    },
                    Err(e) => Action::FailedToLoadNotes(e.to_string()),
                },
                Effect::Insert(note) => match repository.insert(note.clone()).await {
                    Ok(()) => Action::OnNoteAdded(note),
                    Err(e) => Action::OnSaveFailed(e.to_string()),
                },
                Effect::Update(note) => match repository.update(note.clone()).await {
                    Ok(()) => Action::OnSaveSuccessful(note),
                    Err(e) => Action::OnSaveFailed(e.to_string()),
                },
                Effect::Delete(id) => match repository.delete(&id).await {
                    Ok(()) => return,
                    Err(e) => Action::OnDeleteFailed(e.to_string()),
                },
            };
            if let Err(e) = dispatcher.dispatch(follow_up) {
                warn!("Failed to report repository result: {}", e);
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }
}

impl Middleware<NotesState, Action> for NotesPersistence {
    fn dispatch(
        &self,
        dispatcher: &Dispatcher<Action>,
        state: &NotesState,
        message: Action,
        next: Next<'_, NotesState, Action>,
    ) -> Result<()> {
        let effect = Effect::plan(state, &message);
        next.dispatch(dispatcher, state, message)?;
        if let Some(effect) = effect {
            self.spawn(effect, Arc::clone(dispatcher));
        }
        Ok(())
    }

    fn close(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        debug!("Aborting {} repository calls", tasks.len());
        for task in tasks {
            task.abort();
        }
    }
}
