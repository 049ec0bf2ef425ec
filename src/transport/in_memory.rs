//! In-memory broker for testing and single-process scenarios.
//!
//! This module provides a thread-safe broker that implements [`Transport`],
//! useful for:
//! - Unit and integration testing without a running RabbitMQ
//! - Single-process applications
//! - Development and prototyping

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{Channel, MessageStream, QueueOptions, RawMessage, Transport, TransportError};

/// In-memory broker with named work queues.
///
/// Features:
/// - Thread-safe (can be shared across tasks via `Clone`)
/// - Consumers on the same queue compete for messages (round-robin)
/// - Messages published before any consumer attaches wait in the queue
/// - Every accepted publish is recorded in an append-only log for assertions
///
/// ## Example
///
/// ```
/// use futures::StreamExt;
/// use micro_bus::transport::{Channel, InMemoryBroker, QueueOptions, Transport};
///
/// # tokio_test_block(async {
/// let broker = InMemoryBroker::new();
/// let mut channel = broker.open_channel().await.unwrap();
/// channel.declare_queue("OrderCreated", QueueOptions::default()).await.unwrap();
/// channel.publish("OrderCreated", br#"{"id":1}"#.to_vec()).await.unwrap();
///
/// let mut stream = channel.consume("OrderCreated").await.unwrap();
/// let message = stream.next().await.unwrap();
/// assert_eq!(message.routing_key, "OrderCreated");
/// assert_eq!(broker.len(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

#[derive(Default)]
struct BrokerState {
    queues: RwLock<HashMap<String, Queue>>,
    /// Accepted publishes, in order
    log: RwLock<Vec<RawMessage>>,
    channels_opened: AtomicUsize,
    fail_publishes: AtomicBool,
}

#[derive(Default)]
struct Queue {
    options: QueueOptions,
    consumers: Vec<mpsc::UnboundedSender<RawMessage>>,
    next_consumer: usize,
    pending: VecDeque<RawMessage>,
}

impl Queue {
    /// Hand the message to the next live consumer, or park it.
    fn deliver(&mut self, mut message: RawMessage) {
        while !self.consumers.is_empty() {
            let index = self.next_consumer % self.consumers.len();
            match self.consumers[index].send(message) {
                Ok(()) => {
                    self.next_consumer = index + 1;
                    return;
                }
                Err(mpsc::error::SendError(returned)) => {
                    self.consumers.remove(index);
                    message = returned;
                }
            }
        }
        self.pending.push_back(message);
    }
}

impl InMemoryBroker {
    /// Create a new in-memory broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all accepted messages, across queues.
    pub fn messages(&self) -> Vec<RawMessage> {
        self.state
            .log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get all accepted messages routed to one queue.
    pub fn messages_for(&self, queue: &str) -> Vec<RawMessage> {
        self.state
            .log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.routing_key == queue)
            .cloned()
            .collect()
    }

    /// Get the total number of accepted messages.
    pub fn len(&self) -> usize {
        self.state
            .log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no message has been accepted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all declared queues, sorted.
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Declaration flags of a queue, if declared.
    pub fn queue_options(&self, queue: &str) -> Option<QueueOptions> {
        self.state
            .queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue)
            .map(|q| q.options)
    }

    /// Number of consumers attached to a queue that are still listening.
    pub fn consumer_count(&self, queue: &str) -> usize {
        self.state
            .queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue)
            .map(|q| q.consumers.iter().filter(|c| !c.is_closed()).count())
            .unwrap_or(0)
    }

    /// Messages waiting in a queue for a consumer.
    pub fn pending(&self, queue: &str) -> usize {
        self.state
            .queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue)
            .map(|q| q.pending.len())
            .unwrap_or(0)
    }

    /// Number of channels opened since creation.
    pub fn channels_opened(&self) -> usize {
        self.state.channels_opened.load(Ordering::SeqCst)
    }

    /// Make every subsequent publish fail with [`TransportError::Rejected`].
    pub fn fail_publishes(&self, fail: bool) {
        self.state.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Clear the log and every queue's backlog (useful for test cleanup).
    pub fn clear(&self) {
        self.state
            .log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        for queue in self
            .state
            .queues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .values_mut()
        {
            queue.pending.clear();
        }
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn open_channel(&self) -> Result<Box<dyn Channel>, TransportError> {
        self.state.channels_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryChannel {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct InMemoryChannel {
    state: Arc<BrokerState>,
    open: bool,
}

impl InMemoryChannel {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::ChannelClosed)
        }
    }

    fn queues(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Queue>>, TransportError> {
        self.state
            .queues
            .write()
            .map_err(|_| TransportError::ConnectionFailed("broker state poisoned".into()))
    }
}

#[async_trait]
impl Channel for InMemoryChannel {
    async fn declare_queue(
        &mut self,
        queue: &str,
        options: QueueOptions,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut queues = self.queues()?;
        queues.entry(queue.to_string()).or_insert_with(|| Queue {
            options,
            ..Queue::default()
        });
        Ok(())
    }

    async fn publish(&mut self, queue: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.ensure_open()?;
        if self.state.fail_publishes.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(format!("publish to {queue} refused")));
        }

        let message = RawMessage::new(queue, payload);
        let mut queues = self.queues()?;
        match queues.get_mut(queue) {
            Some(q) => q.deliver(message.clone()),
            // Unroutable: the default exchange drops it.
            None => tracing::debug!(queue, "dropping message for undeclared queue"),
        }
        drop(queues);

        self.state
            .log
            .write()
            .map_err(|_| TransportError::ConnectionFailed("broker log poisoned".into()))?
            .push(message);
        Ok(())
    }

    async fn consume(&mut self, queue: &str) -> Result<MessageStream, TransportError> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut queues = self.queues()?;
        let q = queues.get_mut(queue).ok_or_else(|| {
            TransportError::Rejected(format!("queue {queue} has not been declared"))
        })?;

        while let Some(message) = q.pending.pop_front() {
            // The receiver is alive: we hold it.
            let _ = tx.send(message);
        }
        q.consumers.push(tx);

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.open = false;
        Ok(())
    }
}
