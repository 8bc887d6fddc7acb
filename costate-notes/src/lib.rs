//! costate-notes - a notes list driven by a costate store
//!
//! The state lives in a [`ReducerStore`](libcostate::ReducerStore) whose
//! middleware persists changes through a [`NotesRepository`]. Everything
//! runs behind a [`StoreDispatcher`], so callers dispatch from any thread
//! and listeners receive states on the given runtime.

pub mod actions;
pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod reducer;
pub mod repository;
pub mod usecases;

use std::sync::Arc;

use libcostate::{Middleware, StateStore, Store, StoreDispatcher, TracingMiddleware};
use tokio::runtime::Handle;
use tracing::info;

// Re-export commonly used types
pub use actions::Action;
pub use config::Config;
pub use error::{ConfigError, NotesError, Result};
pub use model::{Editor, NoteEntity, NotesState};
pub use persistence::NotesPersistence;
pub use reducer::reduce;
pub use repository::{InMemoryRepository, NotesRepository};
pub use usecases::{edit_note, load_notes};

/// Build the notes store and request the first load
///
/// Messages are processed and listeners notified on `handle`.
pub fn notes_store(
    repository: Arc<dyn NotesRepository>,
    handle: &Handle,
    config: &Config,
) -> Result<StoreDispatcher<NotesState, Action>> {
    let middleware: Vec<Arc<dyn Middleware<NotesState, Action>>> = vec![
        Arc::new(NotesPersistence::new(repository, handle.clone())),
        Arc::new(TracingMiddleware::new("notes")),
    ];
    let store = StateStore::new(NotesState::default()).with_reducer(reduce, middleware);
    let dispatcher = StoreDispatcher::spawn(store, handle, handle)?;

    info!(ttl_secs = config.notes.ttl_secs, "Notes store started");
    dispatcher.dispatch_async(load_notes(config.ttl()));

    Ok(dispatcher)
}
