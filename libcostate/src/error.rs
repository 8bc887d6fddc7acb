//! Error types for costate stores

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by store operations
///
/// Both variants signal programming errors rather than transient faults:
/// a store assumes a single writer at a time, and a closed store
/// stays closed. Callers should fix the call site instead of retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store guard is held by another execution context
    #[error("Concurrent access: store is locked by another execution context")]
    ConcurrentAccess,

    /// The store or its dispatcher has been closed and no longer accepts messages
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// Returns true for guard violations
    pub fn is_concurrent_access(&self) -> bool {
        matches!(self, StoreError::ConcurrentAccess)
    }
}
