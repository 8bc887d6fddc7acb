//! Reducer stores
//!
//! A [`ReducerStore`] turns a state view into a store of messages: each
//! message runs through the middleware chain and, if it reaches the end,
//! is applied to the state by a pure reducer function.

use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::middleware::{Dispatcher, MessageSink, Middleware, MiddlewareChain};
use crate::store::{ActionCreator, StateStore, Store};
use crate::subscription::{Listener, Observable, Subscription};

/// Pure transition `(state, message) -> state`
pub type Reducer<S, M> = Arc<dyn Fn(S, &M) -> S + Send + Sync>;

/// Wrap a closure into a [`Reducer`]
pub fn reducer<S, M, F>(f: F) -> Reducer<S, M>
where
    F: Fn(S, &M) -> S + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Reducer handling only some messages
///
/// Messages for which `f` returns `None` leave the state untouched.
pub fn partial<S, M, F>(f: F) -> Reducer<S, M>
where
    F: Fn(&S, &M) -> Option<S> + Send + Sync + 'static,
{
    Arc::new(move |state: S, message: &M| f(&state, message).unwrap_or(state))
}

/// Chain reducers left to right; an empty list is the identity
pub fn fold<S, M>(reducers: Vec<Reducer<S, M>>) -> Reducer<S, M>
where
    S: 'static,
    M: 'static,
{
    Arc::new(move |state: S, message: &M| {
        reducers.iter().fold(state, |state, r| r(state, message))
    })
}

/// Store of messages applied by a reducer
pub struct ReducerStore<S, M> {
    store: StateStore<S>,
    reducer: Reducer<S, M>,
    chain: Arc<MiddlewareChain<S, M>>,
}

impl<S, M> Clone for ReducerStore<S, M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            reducer: Arc::clone(&self.reducer),
            chain: Arc::clone(&self.chain),
        }
    }
}

/// Default dispatcher handed to middleware: back into the same store
struct Loopback<S, M>(ReducerStore<S, M>);

impl<S, M> MessageSink<M> for Loopback<S, M>
where
    S: Send + Sync + 'static,
    M: Send + 'static,
{
    fn dispatch(&self, message: M) -> Result<()> {
        let sink = self.0.loopback();
        self.0.dispatch_via(&sink, message)
    }
}

impl<S, M> ReducerStore<S, M>
where
    S: Send + Sync + 'static,
    M: Send + 'static,
{
    pub(crate) fn new(store: StateStore<S>, reducer: Reducer<S, M>, middleware: Vec<Arc<dyn Middleware<S, M>>>) -> Self {
        Self {
            store,
            reducer,
            chain: Arc::new(MiddlewareChain::new(middleware)),
        }
    }

    /// The underlying state view
    pub fn store(&self) -> &StateStore<S> {
        &self.store
    }

    /// Dispatch `message`, handing `dispatcher` to the middleware
    ///
    /// Middleware, reducer and listeners all run under the store guard,
    /// in the calling context. Fails with [`StoreError::Closed`] once the
    /// store is closed.
    pub fn dispatch_via(&self, dispatcher: &Dispatcher<M>, message: M) -> Result<()> {
        self.ensure_open()?;
        self.store.guarded(|| {
            let state = self.store.state();
            self.chain.dispatch(dispatcher, &state, message, &|message: M| {
                self.store.dispatch(|state| (self.reducer)(state, &message))
            })
        })?
    }

    /// Evaluate `creator` and dispatch its message via `dispatcher`
    pub fn dispatch_creator_via(&self, dispatcher: &Dispatcher<M>, creator: Box<dyn ActionCreator<S, M>>) -> Result<()> {
        self.ensure_open()?;
        self.store.guarded(|| match creator.create(&self.store.state()) {
            Some(message) => self.dispatch_via(dispatcher, message),
            None => Ok(()),
        })?
    }

    /// Close the middleware chain; later dispatches are rejected
    pub fn close(&self) {
        self.chain.close();
    }

    pub fn is_closed(&self) -> bool {
        self.chain.is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.chain.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn loopback(&self) -> Dispatcher<M> {
        Arc::new(Loopback(self.clone()))
    }
}

impl<S, M> Observable<S> for ReducerStore<S, M>
where
    S: Send + Sync + 'static,
{
    fn subscribe(&self, listener: Listener<S>) -> Result<Subscription> {
        self.store.subscribe(listener)
    }
}

impl<S, M> Store<S, M> for ReducerStore<S, M>
where
    S: Send + Sync + 'static,
    M: Send + 'static,
{
    fn state(&self) -> S {
        self.store.state()
    }

    fn dispatch(&self, action: M) -> Result<()> {
        self.dispatch_via(&self.loopback(), action)
    }

    fn dispatch_boxed(&self, creator: Box<dyn ActionCreator<S, M>>) -> Result<()> {
        self.dispatch_creator_via(&self.loopback(), creator)
    }
}
