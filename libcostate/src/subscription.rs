//! Observable state streams and their subscriptions
//!
//! Subscribing hands out a [`Subscription`]; calling
//! [`Subscription::unsubscribe`] removes the listener, after which it is
//! never invoked again. Unsubscribing twice is harmless.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Callback receiving state snapshots
///
/// Listener identity is the identity of the `Arc`: subscribing the same
/// `Arc` twice registers it once. Clone the listener to reuse it.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Wrap a closure into a [`Listener`]
pub fn listener<T, F>(f: F) -> Listener<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn listener_id<T>(listener: &Listener<T>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

/// A stream of states that listeners can subscribe to
pub trait Observable<T> {
    /// Register `listener` and invoke it with the current state
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrentAccess`](crate::StoreError::ConcurrentAccess)
    /// if another execution context holds the store guard.
    fn subscribe(&self, listener: Listener<T>) -> Result<Subscription>;
}

/// Source that can drop a registration by id
pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64) -> Result<()>;
}

/// Handle to a registered listener
///
/// Subscriptions for the same registration compare equal.
#[derive(Clone)]
pub struct Subscription {
    source: Arc<dyn Unsubscribe>,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(source: Arc<dyn Unsubscribe>, id: u64) -> Self {
        Self { source, id }
    }

    /// Remove the listener
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrentAccess`](crate::StoreError::ConcurrentAccess)
    /// if another execution context holds the store guard; the listener stays
    /// registered in that case.
    pub fn unsubscribe(&self) -> Result<()> {
        self.source.unsubscribe(self.id)
    }

    fn source_ptr(&self) -> *const () {
        Arc::as_ptr(&self.source) as *const ()
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.source_ptr() == other.source_ptr()
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
