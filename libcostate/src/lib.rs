//! Costate - unidirectional state management
//!
//! A single-writer state container with snapshot subscriptions, composable
//! lens-derived sub-stores over a keyed state tree, reducer stores with a
//! middleware pipeline, and a tokio dispatcher that serializes messages
//! onto one task.

pub mod dispatcher;
pub mod error;
pub mod lens;
pub mod lock;
pub mod logging;
pub mod middleware;
pub mod reducer;
pub mod state_node;
pub mod store;
pub mod subscription;

// Re-export commonly used types
pub use dispatcher::StoreDispatcher;
pub use error::{Result, StoreError};
pub use lens::Lens;
pub use middleware::{Dispatcher, MessageSink, Middleware, MiddlewareChain, Next, TracingMiddleware};
pub use reducer::{fold, partial, reducer, Reducer, ReducerStore};
pub use state_node::{NodeKey, StateNode, StateValue};
pub use store::{
    mutation, ActionCreator, AsyncActionCreator, CancelHandle, ChildState, CreatorDispatch, Mutation, StateStore,
    Store,
};
pub use subscription::{listener, Listener, Observable, Subscription};
