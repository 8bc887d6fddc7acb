//! Asynchronous store dispatcher
//!
//! [`StoreDispatcher`] decouples callers from a [`ReducerStore`]. Messages
//! are queued and applied one at a time, in submission order, by a worker
//! task on the *message context*; state changes are delivered to every
//! listener by its own task on the *state context*. Dispatching never
//! blocks and never fails with a concurrency error, because only the worker
//! ever touches the underlying store.
//!
//! ```no_run
//! use libcostate::{listener, Observable, StateStore, Store, StoreDispatcher};
//! use tokio::runtime::Handle;
//!
//! # async fn run() -> libcostate::Result<()> {
//! let store = StateStore::new(0).with_reducer(|state: i32, n: &i32| state + n, vec![]);
//! let dispatcher = StoreDispatcher::spawn(store, &Handle::current(), &Handle::current())?;
//!
//! dispatcher.subscribe(listener(|state: &i32| println!("state: {}", state)))?;
//! dispatcher.dispatch(5)?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{Result, StoreError};
use crate::middleware::{Dispatcher, MessageSink};
use crate::reducer::ReducerStore;
use crate::store::{ActionCreator, Store};
use crate::subscription::{listener, listener_id, Listener, Observable, Subscription, Unsubscribe};

enum Envelope<S, M> {
    Message(M),
    Creator(Box<dyn ActionCreator<S, M>>),
}

/// Producer side of the message queue
struct Queue<S, M> {
    sender: mpsc::UnboundedSender<Envelope<S, M>>,
    closed: Arc<AtomicBool>,
}

impl<S, M> Clone for Queue<S, M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<S, M> Queue<S, M> {
    fn push(&self, envelope: Envelope<S, M>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        self.sender.send(envelope).map_err(|_| StoreError::Closed)
    }
}

impl<S, M> MessageSink<M> for Queue<S, M>
where
    S: Send,
    M: Send,
{
    fn dispatch(&self, message: M) -> Result<()> {
        self.push(Envelope::Message(message))
    }
}

struct Delivery<S> {
    id: u64,
    listener: usize,
    sender: mpsc::UnboundedSender<S>,
    task: JoinHandle<()>,
}

/// Latest state and the per-listener delivery tasks
struct Fanout<S> {
    latest: S,
    deliveries: Vec<Delivery<S>>,
    next_id: u64,
}

impl<S: Clone> Fanout<S> {
    fn publish(&mut self, state: &S) {
        self.latest = state.clone();
        self.deliveries
            .retain(|delivery| delivery.sender.send(state.clone()).is_ok());
    }
}

struct Shared<S, M> {
    queue: Queue<S, M>,
    store: ReducerStore<S, M>,
    fanout: Arc<Mutex<Fanout<S>>>,
    state_context: Handle,
    worker: Mutex<Option<JoinHandle<()>>>,
    store_subscription: Mutex<Option<Subscription>>,
}

impl<S, M> Shared<S, M> {
    fn fanout(&self) -> MutexGuard<'_, Fanout<S>> {
        self.fanout.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn abort_tasks(&self) {
        if let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            worker.abort();
        }
        for delivery in self.fanout().deliveries.drain(..) {
            delivery.task.abort();
        }
    }
}

impl<S, M> Unsubscribe for Shared<S, M>
where
    S: Send,
    M: Send,
{
    fn unsubscribe(&self, id: u64) -> Result<()> {
        let mut fanout = self.fanout();
        if let Some(position) = fanout.deliveries.iter().position(|d| d.id == id) {
            let delivery = fanout.deliveries.remove(position);
            delivery.task.abort();
            debug!(id, "Listener removed from dispatcher");
        }
        Ok(())
    }
}

impl<S, M> Drop for Shared<S, M> {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Queue-backed front of a [`ReducerStore`]
pub struct StoreDispatcher<S, M> {
    shared: Arc<Shared<S, M>>,
}

impl<S, M> Clone for StoreDispatcher<S, M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, M> StoreDispatcher<S, M>
where
    S: Clone + Send + Sync + 'static,
    M: Send + 'static,
{
    /// Start dispatching into `store`
    ///
    /// Messages are applied on `message_context`; listeners are invoked on
    /// `state_context`. Must be called from outside the store's own
    /// listeners.
    pub fn spawn(store: ReducerStore<S, M>, message_context: &Handle, state_context: &Handle) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope<S, M>>();
        let queue = Queue {
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        };

        let fanout = Arc::new(Mutex::new(Fanout {
            latest: Store::state(&store),
            deliveries: Vec::new(),
            next_id: 0,
        }));
        let publish = Arc::clone(&fanout);
        let store_subscription = store.subscribe(listener(move |state: &S| {
            publish
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .publish(state)
        }))?;

        let sink: Dispatcher<M> = Arc::new(queue.clone());
        let worker_store = store.clone();
        let worker = message_context.spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                let result = match envelope {
                    Envelope::Message(message) => worker_store.dispatch_via(&sink, message),
                    Envelope::Creator(creator) => worker_store.dispatch_creator_via(&sink, creator),
                };
                if let Err(e) = result {
                    error!("Failed to apply message: {}", e);
                }
            }
            debug!("Message queue drained");
        });

        Ok(Self {
            shared: Arc::new(Shared {
                queue,
                store,
                fanout,
                state_context: state_context.clone(),
                worker: Mutex::new(Some(worker)),
                store_subscription: Mutex::new(Some(store_subscription)),
            }),
        })
    }

    /// Stop processing messages and deliveries
    ///
    /// Closes the store's middleware. Messages still queued are dropped;
    /// later dispatches fail with [`StoreError::Closed`].
    pub fn close(&self) {
        if self.shared.queue.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Closing store dispatcher");

        self.shared.abort_tasks();
        self.shared.store.close();

        let subscription = self
            .shared
            .store_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            if let Err(e) = subscription.unsubscribe() {
                warn!("Failed to detach dispatcher from store: {}", e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.queue.closed.load(Ordering::Acquire)
    }
}

impl<S, M> Observable<S> for StoreDispatcher<S, M>
where
    S: Clone + Send + Sync + 'static,
    M: Send + 'static,
{
    /// Deliver the latest state, then every later one, on the state context
    fn subscribe(&self, listener: Listener<S>) -> Result<Subscription> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }

        let key = listener_id(&listener);
        let mut fanout = self.shared.fanout();
        if let Some(existing) = fanout.deliveries.iter().find(|d| d.listener == key) {
            return Ok(Subscription::new(self.shared.clone(), existing.id));
        }

        let (sender, mut receiver) = mpsc::unbounded_channel::<S>();
        let _ = sender.send(fanout.latest.clone());
        let task = self.shared.state_context.spawn(async move {
            while let Some(state) = receiver.recv().await {
                listener(&state);
            }
        });

        let id = fanout.next_id;
        fanout.next_id += 1;
        fanout.deliveries.push(Delivery {
            id,
            listener: key,
            sender,
            task,
        });
        debug!(id, "Listener added to dispatcher");

        Ok(Subscription::new(self.shared.clone(), id))
    }
}

impl<S, M> Store<S, M> for StoreDispatcher<S, M>
where
    S: Clone + Send + Sync + 'static,
    M: Send + 'static,
{
    /// Most recently published state
    fn state(&self) -> S {
        self.shared.fanout().latest.clone()
    }

    fn dispatch(&self, action: M) -> Result<()> {
        self.shared.queue.push(Envelope::Message(action))
    }

    fn dispatch_boxed(&self, creator: Box<dyn ActionCreator<S, M>>) -> Result<()> {
        self.shared.queue.push(Envelope::Creator(creator))
    }
}
