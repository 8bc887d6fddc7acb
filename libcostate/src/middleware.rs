//! Message middleware
//!
//! Middleware sits between a dispatch and the reducer of a
//! [`ReducerStore`](crate::ReducerStore). Each middleware receives the
//! current state, the message and the rest of the chain; it may pass the
//! message on (possibly transformed), drop it, or dispatch further messages
//! through the [`Dispatcher`] it is handed. The last link of the chain
//! applies the reducer.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;

/// Destination for messages
pub trait MessageSink<M>: Send + Sync {
    fn dispatch(&self, message: M) -> Result<()>;
}

/// Shared handle middleware use to dispatch follow-up messages
pub type Dispatcher<M> = Arc<dyn MessageSink<M>>;

pub trait Middleware<S, M>: Send + Sync {
    /// Handle `message`, forwarding it with `next` to continue the chain
    fn dispatch(&self, dispatcher: &Dispatcher<M>, state: &S, message: M, next: Next<'_, S, M>) -> Result<()>;

    /// Release resources; called once when the owning store closes
    fn close(&self) {}
}

/// Remainder of a middleware chain
pub struct Next<'a, S, M> {
    rest: &'a [Arc<dyn Middleware<S, M>>],
    terminal: &'a dyn Fn(M) -> Result<()>,
}

impl<S, M> Next<'_, S, M> {
    /// Pass `message` to the next middleware, or to the reducer at the end
    pub fn dispatch(self, dispatcher: &Dispatcher<M>, state: &S, message: M) -> Result<()> {
        match self.rest.split_first() {
            Some((head, rest)) => head.dispatch(
                dispatcher,
                state,
                message,
                Next {
                    rest,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(message),
        }
    }
}

/// Ordered middleware list owned by a store
pub struct MiddlewareChain<S, M> {
    middleware: Vec<Arc<dyn Middleware<S, M>>>,
    closed: AtomicBool,
}

impl<S, M> MiddlewareChain<S, M> {
    pub fn new(middleware: Vec<Arc<dyn Middleware<S, M>>>) -> Self {
        Self {
            middleware,
            closed: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run `message` through every middleware, then `terminal`
    pub fn dispatch(
        &self,
        dispatcher: &Dispatcher<M>,
        state: &S,
        message: M,
        terminal: &dyn Fn(M) -> Result<()>,
    ) -> Result<()> {
        Next {
            rest: &self.middleware,
            terminal,
        }
        .dispatch(dispatcher, state, message)
    }

    /// Close every middleware in order; later calls do nothing
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Closing {} middleware", self.middleware.len());
        for middleware in &self.middleware {
            middleware.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Logs every message passing through at debug level
#[derive(Debug, Clone)]
pub struct TracingMiddleware {
    store: String,
}

impl TracingMiddleware {
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
        }
    }
}

impl<S, M> Middleware<S, M> for TracingMiddleware
where
    M: Debug,
{
    fn dispatch(&self, dispatcher: &Dispatcher<M>, state: &S, message: M, next: Next<'_, S, M>) -> Result<()> {
        debug!(store = %self.store, message = ?message, "Dispatching message");
        let result = next.dispatch(dispatcher, state, message);
        if let Err(e) = &result {
            debug!(store = %self.store, error = %e, "Message rejected");
        }
        result
    }

    fn close(&self) {
        debug!(store = %self.store, "Store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<i32>>,
    }

    impl MessageSink<i32> for Recorder {
        fn dispatch(&self, message: i32) -> Result<()> {
            self.messages.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct Tag {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware<i32, i32> for Tag {
        fn dispatch(&self, dispatcher: &Dispatcher<i32>, state: &i32, message: i32, next: Next<'_, i32, i32>) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, message));
            next.dispatch(dispatcher, state, message)
        }

        fn close(&self) {
            self.log.lock().unwrap().push(format!("close {}", self.name));
        }
    }

    /// Drops odd messages, doubles even ones
    struct EvenDoubler;

    impl Middleware<i32, i32> for EvenDoubler {
        fn dispatch(&self, dispatcher: &Dispatcher<i32>, state: &i32, message: i32, next: Next<'_, i32, i32>) -> Result<()> {
            if message % 2 != 0 {
                return Ok(());
            }
            next.dispatch(dispatcher, state, message * 2)
        }
    }

    /// Re-dispatches every message once more, plus one
    struct Echo;

    impl Middleware<i32, i32> for Echo {
        fn dispatch(&self, dispatcher: &Dispatcher<i32>, state: &i32, message: i32, next: Next<'_, i32, i32>) -> Result<()> {
            next.dispatch(dispatcher, state, message)?;
            dispatcher.dispatch(message + 1)
        }
    }

    fn run(chain: &MiddlewareChain<i32, i32>, sink: &Dispatcher<i32>, message: i32) -> Vec<i32> {
        let reached = Mutex::new(Vec::new());
        chain
            .dispatch(sink, &0, message, &|m| {
                reached.lock().unwrap().push(m);
                Ok(())
            })
            .unwrap();
        reached.into_inner().unwrap()
    }

    #[test]
    fn test_empty_chain_reaches_terminal() {
        let chain = MiddlewareChain::new(vec![]);
        let sink: Dispatcher<i32> = Arc::new(Recorder::default());

        assert!(chain.is_empty());
        assert_eq!(run(&chain, &sink, 7), vec![7]);
    }

    #[test]
    fn test_middleware_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: MiddlewareChain<i32, i32> = MiddlewareChain::new(vec![
            Arc::new(Tag { name: "a", log: log.clone() }),
            Arc::new(Tag { name: "b", log: log.clone() }),
        ]);
        let sink: Dispatcher<i32> = Arc::new(Recorder::default());

        assert_eq!(run(&chain, &sink, 1), vec![1]);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn test_middleware_can_drop_and_transform() {
        let chain: MiddlewareChain<i32, i32> = MiddlewareChain::new(vec![Arc::new(EvenDoubler)]);
        let sink: Dispatcher<i32> = Arc::new(Recorder::default());

        assert_eq!(run(&chain, &sink, 3), Vec::<i32>::new());
        assert_eq!(run(&chain, &sink, 4), vec![8]);
    }

    #[test]
    fn test_middleware_dispatches_follow_up() {
        let chain: MiddlewareChain<i32, i32> = MiddlewareChain::new(vec![Arc::new(Echo)]);
        let recorder = Arc::new(Recorder::default());
        let sink: Dispatcher<i32> = recorder.clone();

        assert_eq!(run(&chain, &sink, 1), vec![1]);
        assert_eq!(*recorder.messages.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_close_runs_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: MiddlewareChain<i32, i32> = MiddlewareChain::new(vec![
            Arc::new(Tag { name: "a", log: log.clone() }),
            Arc::new(Tag { name: "b", log: log.clone() }),
        ]);

        chain.close();
        chain.close();

        assert!(chain.is_closed());
        assert_eq!(*log.lock().unwrap(), vec!["close a", "close b"]);
    }
}
