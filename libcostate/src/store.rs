//! State stores
//!
//! A [`StateStore`] is a view over a shared state tree. The root view is
//! created with [`StateStore::new`]; further views are derived from it with
//! [`StateStore::map`] (focus through a lens) and [`StateStore::sub_state`]
//! (attach a lazily initialised, keyed child state). Every view dispatches
//! into and subscribes on the same root, so a dispatch on any view is a
//! single atomic replacement of the whole tree and every listener, at every
//! level, observes a consistent snapshot.
//!
//! # Dispatch
//!
//! Dispatching a mutation:
//!
//! 1. enters the store guard, failing with
//!    [`StoreError::ConcurrentAccess`](crate::StoreError::ConcurrentAccess)
//!    if another execution context holds it,
//! 2. computes the new tree,
//! 3. if it differs from the current one, replaces it and invokes every
//!    registered listener in registration order,
//! 4. leaves the guard, on every exit path.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use libcostate::{listener, Observable, StateStore};
//!
//! # fn main() -> libcostate::Result<()> {
//! let store = StateStore::new(23);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! store.subscribe(listener(move |state: &i32| sink.lock().unwrap().push(*state)))?;
//! store.dispatch(|state| state * 2)?;
//!
//! assert_eq!(*seen.lock().unwrap(), vec![23, 46]);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::error::Result;
use crate::lens::Lens;
use crate::lock::Lock;
use crate::middleware::Middleware;
use crate::reducer::ReducerStore;
use crate::state_node::{child_lens, value_lens, NodeKey, StateNode, StateValue};
use crate::subscription::{listener_id, Listener, Observable, Subscription, Unsubscribe};

/// Pure state transition dispatched to a [`StateStore`]
pub type Mutation<S> = Box<dyn FnOnce(S) -> S + Send>;

/// Box a closure into a [`Mutation`]
pub fn mutation<S, F>(f: F) -> Mutation<S>
where
    F: FnOnce(S) -> S + Send + 'static,
{
    Box::new(f)
}

/// Derives zero or one action from the current state
pub trait ActionCreator<S, A>: Send {
    fn create(self: Box<Self>, state: &S) -> Option<A>;
}

impl<S, A, F> ActionCreator<S, A> for F
where
    F: FnOnce(&S) -> Option<A> + Send,
{
    fn create(self: Box<Self>, state: &S) -> Option<A> {
        (*self)(state)
    }
}

/// Dispatches any number of action creators, now or later
///
/// The creator receives the state at invocation time and a
/// [`CreatorDispatch`] it may keep (and move into background tasks) to
/// dispatch follow-up action creators. Each follow-up is evaluated against
/// the state current at the time it is dispatched.
pub trait AsyncActionCreator<S, A> {
    fn run(self, state: &S, dispatch: CreatorDispatch<S, A>);
}

impl<S, A, F> AsyncActionCreator<S, A> for F
where
    F: FnOnce(&S, CreatorDispatch<S, A>),
{
    fn run(self, state: &S, dispatch: CreatorDispatch<S, A>) {
        self(state, dispatch)
    }
}

/// Common contract of every store flavour
///
/// `A` is the action vocabulary: [`Mutation`]s for a [`StateStore`],
/// caller-defined messages for a [`ReducerStore`] or a
/// [`StoreDispatcher`](crate::StoreDispatcher).
pub trait Store<S, A>: Observable<S> + Send + Sync {
    /// Current state
    fn state(&self) -> S;

    /// Dispatch one action
    fn dispatch(&self, action: A) -> Result<()>;

    /// Evaluate `creator` against the current state and dispatch its action
    ///
    /// Evaluation and dispatch happen under the store guard, so the creator
    /// never sees a state that is replaced before its action applies.
    fn dispatch_boxed(&self, creator: Box<dyn ActionCreator<S, A>>) -> Result<()>;

    /// Closure form of [`Store::dispatch_boxed`]
    fn dispatch_creator<F>(&self, creator: F) -> Result<()>
    where
        F: FnOnce(&S) -> Option<A> + Send + 'static,
        Self: Sized,
    {
        self.dispatch_boxed(Box::new(creator))
    }

    /// Run an async action creator
    ///
    /// Returns a handle that stops further follow-up dispatches when
    /// cancelled.
    fn dispatch_async<C>(&self, creator: C) -> CancelHandle
    where
        C: AsyncActionCreator<S, A>,
        Self: Clone + Sized + 'static,
    {
        let dispatch = CreatorDispatch::new(Arc::new(self.clone()));
        let cancel = dispatch.cancel_handle();
        creator.run(&self.state(), dispatch);
        cancel
    }
}

/// Callback handed to async action creators
pub struct CreatorDispatch<S, A> {
    store: Arc<dyn Store<S, A>>,
    cancelled: Arc<AtomicBool>,
}

impl<S, A> Clone for CreatorDispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

impl<S, A> CreatorDispatch<S, A> {
    pub(crate) fn new(store: Arc<dyn Store<S, A>>) -> Self {
        Self {
            store,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Dispatch a follow-up action creator
    ///
    /// Does nothing once the originating dispatch has been cancelled.
    pub fn dispatch<F>(&self, creator: F) -> Result<()>
    where
        F: FnOnce(&S) -> Option<A> + Send + 'static,
    {
        if self.is_cancelled() {
            trace!("Dropping follow-up dispatch of a cancelled action creator");
            return Ok(());
        }
        self.store.dispatch_boxed(Box::new(creator))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

/// Cancels the follow-ups of an async action creator
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Value of a [`StateStore::sub_state`] view: the parent view's state paired
/// with the child's own state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ChildState<P, C> {
    pub parent_state: P,
    pub state: C,
}

impl<P, C> ChildState<P, C> {
    pub fn new(parent_state: P, state: C) -> Self {
        Self {
            parent_state,
            state,
        }
    }
}

type NodeCallback = Arc<dyn Fn(&StateNode) + Send + Sync>;

struct Registration {
    id: u64,
    key: (usize, usize),
    callback: NodeCallback,
    active: Arc<AtomicBool>,
}

/// Guarded root shared by all views of one store
struct Core {
    lock: Lock,
    tree: Mutex<StateNode>,
    listeners: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
    /// Bumped by every notifying update
    generation: AtomicU64,
}

impl Core {
    fn new(root: StateNode) -> Self {
        Self {
            lock: Lock::new(),
            tree: Mutex::new(root),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> StateNode {
        self.tree
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, tree: StateNode) {
        *self.tree.lock().unwrap_or_else(PoisonError::into_inner) = tree;
    }

    /// Apply `transition` and notify listeners if the tree changed
    fn update(&self, transition: impl FnOnce(&StateNode) -> StateNode) -> Result<()> {
        let _entered = self.lock.enter()?;

        let current = self.snapshot();
        let next = transition(&current);
        if next == current {
            debug!("State unchanged, listeners not notified");
            return Ok(());
        }
        self.replace(next.clone());
        let published = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let callbacks: Vec<(NodeCallback, Arc<AtomicBool>)> = self
            .listeners()
            .iter()
            .map(|r| (Arc::clone(&r.callback), Arc::clone(&r.active)))
            .collect();
        trace!(listeners = callbacks.len(), "State changed");

        for (callback, active) in callbacks {
            // a listener dispatched again; that round already reached everyone
            if self.generation.load(Ordering::Acquire) != published {
                trace!("State superseded during notification");
                break;
            }
            // unsubscribed by an earlier listener of this round
            if active.load(Ordering::Acquire) {
                callback(&next);
            }
        }
        Ok(())
    }

    /// Replace the tree without notifying anyone
    fn update_quietly(&self, transition: impl FnOnce(&StateNode) -> Option<StateNode>) -> Result<()> {
        let _entered = self.lock.enter()?;
        if let Some(next) = transition(&self.snapshot()) {
            self.replace(next);
        }
        Ok(())
    }

    fn subscribe(self: &Arc<Self>, key: (usize, usize), callback: NodeCallback) -> Result<Subscription> {
        let _entered = self.lock.enter()?;

        let id = {
            let mut listeners = self.listeners();
            if let Some(existing) = listeners.iter().find(|r| r.key == key) {
                trace!(id = existing.id, "Listener already registered");
                return Ok(Subscription::new(Arc::clone(self) as Arc<dyn Unsubscribe>, existing.id));
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            listeners.push(Registration {
                id,
                key,
                callback: Arc::clone(&callback),
                active: Arc::new(AtomicBool::new(true)),
            });
            id
        };
        trace!(id, "Listener registered");

        callback(&self.snapshot());
        Ok(Subscription::new(Arc::clone(self) as Arc<dyn Unsubscribe>, id))
    }
}

impl Unsubscribe for Core {
    fn unsubscribe(&self, id: u64) -> Result<()> {
        let _entered = self.lock.enter()?;

        let mut listeners = self.listeners();
        if let Some(position) = listeners.iter().position(|r| r.id == id) {
            let registration = listeners.remove(position);
            registration.active.store(false, Ordering::Release);
            trace!(id, "Listener removed");
        }
        Ok(())
    }
}

/// Store view focused on a `T` inside a shared state tree
pub struct StateStore<T> {
    core: Arc<Core>,
    node: Lens<StateNode, StateNode>,
    value: Lens<StateNode, T>,
}

impl<T> Clone for StateStore<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            node: self.node.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T> StateStore<T>
where
    T: StateValue + Clone,
{
    /// Create a root store holding `initial`
    pub fn new(initial: T) -> Self {
        let fallback = initial.clone();
        Self {
            core: Arc::new(Core::new(StateNode::new(initial))),
            node: Lens::identity(),
            value: value_lens(move || fallback.clone()),
        }
    }
}

impl<T> StateStore<T>
where
    T: Send + Sync + 'static,
{
    /// Current state of this view
    pub fn state(&self) -> T {
        self.value.get(&self.core.snapshot())
    }

    /// Apply `mutation` to this view's state
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrentAccess`](crate::StoreError::ConcurrentAccess)
    /// if another execution context is dispatching.
    pub fn dispatch<F>(&self, mutation: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let value = &self.value;
        self.core.update(|tree| value.modify(tree, mutation))
    }

    /// Derive a view focused through `lens`
    pub fn map<U>(&self, lens: Lens<T, U>) -> StateStore<U>
    where
        U: 'static,
    {
        StateStore {
            core: Arc::clone(&self.core),
            node: self.node.clone(),
            value: self.value.compose(&lens),
        }
    }

    /// Derive a view pairing this view's state with a keyed child state
    ///
    /// The child is created with `init` the first time `key` is used under
    /// this view's node; later calls with the same key reuse the stored
    /// value. Creating the child does not notify listeners.
    pub fn sub_state<C, F>(&self, key: impl Into<NodeKey>, init: F) -> Result<StateStore<ChildState<T, C>>>
    where
        C: StateValue + Clone,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let key = key.into();
        let init = Arc::new(init);

        let node_init = Arc::clone(&init);
        let child_node = self.node.compose(&child_lens(key.clone(), move || node_init()));
        let value_init = Arc::clone(&init);
        let child_value = child_node.compose(&value_lens(move || value_init()));

        let parent_node = self.node.clone();
        self.core.update_quietly(|tree| {
            let parent = parent_node.get(tree);
            if parent.child(&key).is_some() {
                return None;
            }
            trace!(key = %key, "Initializing child state");
            Some(parent_node.set(tree, parent.with_child(key.clone(), StateNode::new(init()))))
        })?;

        let (parent_get, child_get) = (self.value.clone(), child_value.clone());
        let parent_set = self.value.clone();
        let value = Lens::new(
            move |tree: &StateNode| ChildState {
                parent_state: parent_get.get(tree),
                state: child_get.get(tree),
            },
            move |tree: &StateNode, value: ChildState<T, C>| {
                let tree = parent_set.set(tree, value.parent_state);
                child_value.set(&tree, value.state)
            },
        );

        Ok(StateStore {
            core: Arc::clone(&self.core),
            node: child_node,
            value,
        })
    }

    /// Wrap this view into a store of actions applied by `reducer`
    ///
    /// Every action passes through `middleware`, in order, before it
    /// reaches the reducer.
    pub fn with_reducer<M, R>(&self, reducer: R, middleware: Vec<Arc<dyn Middleware<T, M>>>) -> ReducerStore<T, M>
    where
        M: Send + 'static,
        R: Fn(T, &M) -> T + Send + Sync + 'static,
    {
        ReducerStore::new(self.clone(), Arc::new(reducer), middleware)
    }

    /// Run `block` while holding the store guard
    pub(crate) fn guarded<R>(&self, block: impl FnOnce() -> R) -> Result<R> {
        self.core.lock.with(block)
    }

    /// Whether some execution context is inside this store right now
    pub fn is_dispatching(&self) -> bool {
        self.core.lock.is_held()
    }
}

impl<T> Observable<T> for StateStore<T>
where
    T: Send + Sync + 'static,
{
    fn subscribe(&self, listener: Listener<T>) -> Result<Subscription> {
        let key = (listener_id(&listener), self.value.id());
        let value = self.value.clone();
        self.core.subscribe(
            key,
            Arc::new(move |tree: &StateNode| listener(&value.get(tree))),
        )
    }
}

impl<T> Store<T, Mutation<T>> for StateStore<T>
where
    T: Send + Sync + 'static,
{
    fn state(&self) -> T {
        StateStore::state(self)
    }

    fn dispatch(&self, action: Mutation<T>) -> Result<()> {
        StateStore::dispatch(self, action)
    }

    fn dispatch_boxed(&self, creator: Box<dyn ActionCreator<T, Mutation<T>>>) -> Result<()> {
        self.guarded(|| match creator.create(&StateStore::state(self)) {
            Some(mutation) => StateStore::dispatch(self, mutation),
            None => Ok(()),
        })?
    }
}
