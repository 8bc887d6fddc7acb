//! Single-writer guard for stores
//!
//! A [`Lock`] admits one execution context at a time. The context holding
//! it may enter again (a listener subscribing from inside its own callback,
//! a middleware dispatching a follow-up synchronously), while any other
//! context is turned away immediately with [`StoreError::ConcurrentAccess`]
//! instead of blocking.
//!
//! Contexts are identified per OS thread. Stores never hold the guard
//! across an `.await`, so a task that migrates between worker threads only
//! ever holds it while running synchronously on one of them.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::{Result, StoreError};

const UNOWNED: u64 = 0;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CONTEXT_ID: u64 = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
}

fn current_context() -> u64 {
    CONTEXT_ID.with(|id| *id)
}

/// Non-reentrant (across contexts) guard
#[derive(Debug, Default)]
pub struct Lock {
    owner: AtomicU64,
    depth: AtomicUsize,
}

/// Proof of having entered a [`Lock`]
///
/// Dropping it leaves the lock; the last drop in the owning context releases
/// it. The token cannot be sent to another thread, so it is always released
/// by the context that acquired it.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct Entered<'a> {
    lock: &'a Lock,
    _not_send: PhantomData<*const ()>,
}

impl Lock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the lock from the current context
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrentAccess`] if another context holds it.
    pub fn enter(&self) -> Result<Entered<'_>> {
        let me = current_context();
        let owned = self.owner.load(Ordering::Acquire) == me
            || self
                .owner
                .compare_exchange(UNOWNED, me, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();

        if !owned {
            tracing::debug!("Rejected store access from context {}", me);
            return Err(StoreError::ConcurrentAccess);
        }

        self.depth.fetch_add(1, Ordering::AcqRel);
        Ok(Entered {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Run `block` while holding the lock
    pub fn with<R>(&self, block: impl FnOnce() -> R) -> Result<R> {
        let _entered = self.enter()?;
        Ok(block())
    }

    /// Number of nested entries held by the owning context
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether any context currently holds the lock
    pub fn is_held(&self) -> bool {
        self.owner.load(Ordering::Acquire) != UNOWNED
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        if self.lock.depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.lock.owner.store(UNOWNED, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_same_context_reentry() {
        let lock = Lock::new();

        let outer = lock.enter().unwrap();
        assert_eq!(lock.depth(), 1);
        {
            let _inner = lock.enter().unwrap();
            assert_eq!(lock.depth(), 2);
        }
        assert_eq!(lock.depth(), 1);
        assert!(lock.is_held());

        drop(outer);
        assert_eq!(lock.depth(), 0);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_foreign_context_rejected() {
        let lock = Arc::new(Lock::new());
        let _entered = lock.enter().unwrap();

        let other = Arc::clone(&lock);
        let result = std::thread::spawn(move || other.enter().map(|_| ()))
            .join()
            .unwrap();

        assert_eq!(result, Err(StoreError::ConcurrentAccess));
    }

    #[test]
    fn test_released_lock_can_move_to_another_context() {
        let lock = Arc::new(Lock::new());
        lock.with(|| ()).unwrap();

        let other = Arc::clone(&lock);
        let result = std::thread::spawn(move || other.with(|| 42))
            .join()
            .unwrap();

        assert_eq!(result, Ok(42));
    }

    #[test]
    fn test_released_on_panic() {
        let lock = Lock::new();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = lock.with(|| panic!("boom"));
        }));

        assert!(outcome.is_err());
        assert!(!lock.is_held());
        assert_eq!(lock.depth(), 0);
    }
}
