//! Shared helpers for store integration tests

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use libcostate::{listener, Listener};

/// Ordered record of listener invocations across several listeners
#[derive(Clone, Default)]
pub struct Log {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener recording `tag:value` for every state it receives
    pub fn listener<T: Debug + 'static>(&self, tag: &'static str) -> Listener<T> {
        let entries = Arc::clone(&self.entries);
        listener(move |state: &T| entries.lock().unwrap().push(format!("{}:{:?}", tag, state)))
    }

    /// Entries recorded so far, clearing the log
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }
}
