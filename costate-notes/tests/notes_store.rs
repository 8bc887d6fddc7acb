//! End-to-end tests of the notes store on a tokio runtime

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use costate_notes::{
    edit_note, load_notes, notes_store, Action, Config, InMemoryRepository, NoteEntity, NotesError, NotesRepository,
    NotesState,
};
use libcostate::{listener, Observable, Store, StoreDispatcher, StoreError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;

struct Harness {
    store: StoreDispatcher<NotesState, Action>,
    states: mpsc::UnboundedReceiver<NotesState>,
}

impl Harness {
    fn start(repository: Arc<dyn NotesRepository>) -> Self {
        let store = notes_store(repository, &Handle::current(), &Config::default()).unwrap();
        let (tx, states) = mpsc::unbounded_channel();
        store
            .subscribe(listener(move |state: &NotesState| {
                let _ = tx.send(state.clone());
            }))
            .unwrap();
        Self { store, states }
    }

    /// Wait for the first published state matching `predicate`
    async fn wait_for(&mut self, predicate: impl Fn(&NotesState) -> bool) -> NotesState {
        loop {
            let state = timeout(Duration::from_secs(5), self.states.recv())
                .await
                .expect("timed out waiting for state")
                .expect("store stopped publishing");
            if predicate(&state) {
                return state;
            }
        }
    }

    async fn loaded(&mut self) -> NotesState {
        self.wait_for(|s| s.last_fetched.is_some() && !s.is_loading).await
    }
}

fn seeded() -> Arc<InMemoryRepository> {
    Arc::new(InMemoryRepository::with_notes([
        NoteEntity::new("1", "milk"),
        NoteEntity::new("2", "eggs"),
    ]))
}

/// Fails the first `failures` calls of every kind, then succeeds
struct Flaky {
    inner: InMemoryRepository,
    failures: AtomicUsize,
}

impl Flaky {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryRepository::with_notes([NoteEntity::new("1", "milk")]),
            failures: AtomicUsize::new(failures),
        }
    }

    fn check(&self) -> costate_notes::Result<()> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(NotesError::Repository("disk unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotesRepository for Flaky {
    async fn list(&self) -> costate_notes::Result<Vec<NoteEntity>> {
        self.check()?;
        self.inner.list().await
    }

    async fn insert(&self, note: NoteEntity) -> costate_notes::Result<()> {
        self.check()?;
        self.inner.insert(note).await
    }

    async fn update(&self, note: NoteEntity) -> costate_notes::Result<()> {
        self.check()?;
        self.inner.update(note).await
    }

    async fn delete(&self, id: &str) -> costate_notes::Result<()> {
        self.check()?;
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn test_store_loads_notes_on_start() {
    let mut harness = Harness::start(seeded());

    let state = harness.loaded().await;

    assert_eq!(
        state.entities,
        vec![NoteEntity::new("1", "milk"), NoteEntity::new("2", "eggs")]
    );
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_edit_and_save_existing_note() {
    let repository = seeded();
    let mut harness = Harness::start(repository.clone());
    harness.loaded().await;

    harness.store.dispatch_creator(edit_note("1")).unwrap();
    harness
        .store
        .dispatch(Action::UpdateEditorText("oat milk".to_string()))
        .unwrap();
    harness.store.dispatch(Action::SaveEdit).unwrap();

    let saving = harness
        .wait_for(|s| s.editor.as_ref().is_some_and(|e| e.is_saving))
        .await;
    assert_eq!(saving.editor.unwrap().text, "oat milk");

    let saved = harness.wait_for(|s| s.editor.is_none()).await;
    assert_eq!(saved.entities[0], NoteEntity::new("1", "oat milk"));
    assert_eq!(repository.list().await.unwrap()[0].text, "oat milk");
}

#[tokio::test]
async fn test_new_note_is_persisted() {
    let repository = seeded();
    let mut harness = Harness::start(repository.clone());
    harness.loaded().await;

    harness.store.dispatch(Action::NewNote).unwrap();
    harness
        .store
        .dispatch(Action::UpdateEditorText("bread".to_string()))
        .unwrap();
    harness.store.dispatch(Action::SaveEdit).unwrap();

    let state = harness.wait_for(|s| s.entities.len() == 3).await;
    assert!(state.editor.is_none());
    assert_eq!(state.entities[2].text, "bread");

    let stored = repository.list().await.unwrap();
    assert_eq!(stored[2], state.entities[2]);
}

#[tokio::test]
async fn test_delete_note() {
    let repository = seeded();
    let mut harness = Harness::start(repository.clone());
    harness.loaded().await;

    harness
        .store
        .dispatch(Action::DeleteNote("1".to_string()))
        .unwrap();

    let state = harness.wait_for(|s| s.entities.len() == 1).await;
    assert_eq!(state.entities, vec![NoteEntity::new("2", "eggs")]);

    // the repository call finishes after the optimistic removal
    timeout(Duration::from_secs(5), async {
        while repository.list().await.unwrap().len() != 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_failed_load_is_retried() {
    let mut harness = Harness::start(Arc::new(Flaky::new(1)));

    let failed = harness.wait_for(|s| s.error.is_some()).await;
    assert_eq!(
        failed.error.as_deref(),
        Some("Repository error: disk unavailable")
    );
    assert!(!failed.is_loading);

    harness
        .store
        .dispatch_async(load_notes(Duration::from_secs(180)));

    let loaded = harness.loaded().await;
    assert!(loaded.error.is_none());
    assert_eq!(loaded.entities, vec![NoteEntity::new("1", "milk")]);
}

#[tokio::test]
async fn test_failed_save_keeps_editor() {
    let repository = Arc::new(Flaky::new(0));
    let mut harness = Harness::start(repository.clone());
    harness.loaded().await;
    repository.failures.store(1, Ordering::SeqCst);

    harness.store.dispatch_creator(edit_note("1")).unwrap();
    harness.store.dispatch(Action::SaveEdit).unwrap();

    let failed = harness
        .wait_for(|s| s.editor.as_ref().is_some_and(|e| e.error.is_some()))
        .await;
    let editor = failed.editor.unwrap();
    assert!(!editor.is_saving);
    assert_eq!(failed.entities, vec![NoteEntity::new("1", "milk")]);
}

#[tokio::test]
async fn test_failed_delete_reports_error() {
    let repository = Arc::new(Flaky::new(0));
    let mut harness = Harness::start(repository.clone());
    harness.loaded().await;
    repository.failures.store(1, Ordering::SeqCst);

    harness
        .store
        .dispatch(Action::DeleteNote("1".to_string()))
        .unwrap();

    let failed = harness.wait_for(|s| s.error.is_some()).await;
    assert!(failed.entities.is_empty());

    harness.store.dispatch(Action::DismissError).unwrap();
    harness.wait_for(|s| s.error.is_none()).await;
}

#[tokio::test]
async fn test_closed_store_rejects_dispatch() {
    let mut harness = Harness::start(seeded());
    harness.loaded().await;

    harness.store.close();

    assert_eq!(
        harness.store.dispatch(Action::NewNote),
        Err(StoreError::Closed)
    );
    assert!(harness.store.is_closed());
}
