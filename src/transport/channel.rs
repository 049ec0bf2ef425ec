//! Core transport traits.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// A message as delivered by the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    /// Queue the message was routed through (the event type name).
    pub routing_key: String,
    /// Encoded event body.
    pub payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(routing_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload,
        }
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Queue declaration flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueOptions {
    /// Survive a broker restart.
    pub durable: bool,
}

/// Messages pushed by the broker to a consumer. Delivery is auto-acknowledged.
pub type MessageStream = BoxStream<'static, RawMessage>;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to the broker failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The channel was closed before the operation completed
    #[error("channel closed")]
    ChannelClosed,
    /// The broker refused the operation
    #[error("rejected by broker: {0}")]
    Rejected(String),
}

/// A connection to a message broker.
///
/// Implementations might include:
/// - `InMemoryBroker` - For testing and single-process scenarios
/// - an AMQP client for RabbitMQ
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a fresh channel. Channels are not safe for concurrent use.
    async fn open_channel(&self) -> Result<Box<dyn Channel>, TransportError>;
}

/// A single-owner session on a broker connection.
#[async_trait]
pub trait Channel: Send {
    /// Declare a queue. Idempotent.
    async fn declare_queue(&mut self, queue: &str, options: QueueOptions)
        -> Result<(), TransportError>;

    /// Send a payload to the named queue.
    async fn publish(&mut self, queue: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Register as an auto-acknowledging consumer of the named queue.
    async fn consume(&mut self, queue: &str) -> Result<MessageStream, TransportError>;

    /// Release the channel.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
