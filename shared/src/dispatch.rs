//! Maps decoded commands to registered handlers.
//!
//! Each routed message is scheduled on the worker pool rather than executed
//! inline, so a handler waiting on a reply cannot stall the receive loop that
//! fed it. Unknown tags are logged and dropped, never fatal.

use crate::pool::WorkerPool;
use log::warn;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Implemented by both channel message enums; the tag selects the handler.
pub trait Tagged {
    fn tag(&self) -> &'static str;
}

type BoxedHandler<M> =
    Box<dyn Fn(M) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct Router<M> {
    handlers: HashMap<&'static str, BoxedHandler<M>>,
    pool: Arc<WorkerPool>,
}

impl<M: Tagged + Send + 'static> Router<M> {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            handlers: HashMap::new(),
            pool,
        }
    }

    pub fn register<H, F>(&mut self, tag: &'static str, handler: H)
    where
        H: Fn(M) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.handlers.insert(tag, Box::new(move |msg| Box::pin(handler(msg))));
    }

    /// Schedules the matching handler on the pool. Returns whether the
    /// message was scheduled.
    pub async fn route(&self, msg: M) -> bool {
        let tag = msg.tag();
        let Some(handler) = self.handlers.get(tag) else {
            warn!("no handler registered for '{}', dropping message", tag);
            return false;
        };
        if self.pool.submit(handler(msg)).await.is_err() {
            warn!("worker pool closed, dropping '{}'", tag);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration};

    #[derive(Debug, Clone, PartialEq)]
    enum TestMessage {
        Ping(u32),
        Unroutable,
    }

    impl Tagged for TestMessage {
        fn tag(&self) -> &'static str {
            match self {
                TestMessage::Ping(_) => "ping",
                TestMessage::Unroutable => "unroutable",
            }
        }
    }

    #[tokio::test]
    async fn test_route_runs_registered_handler() {
        let pool = Arc::new(WorkerPool::new(1, 4));
        let mut router = Router::new(Arc::clone(&pool));
        let (tx, mut rx) = mpsc::unbounded_channel();

        router.register("ping", move |msg: TestMessage| {
            let tx = tx.clone();
            async move {
                if let TestMessage::Ping(value) = msg {
                    let _ = tx.send(value);
                }
            }
        });

        assert!(router.route(TestMessage::Ping(7)).await);
        let received = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(received, Some(7));
    }

    #[tokio::test]
    async fn test_unknown_tag_is_dropped() {
        let pool = Arc::new(WorkerPool::new(1, 4));
        let router: Router<TestMessage> = Router::new(pool);
        assert!(!router.route(TestMessage::Unroutable).await);
    }
}
