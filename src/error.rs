use thiserror::Error;

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Errors surfaced by [`EventBus`](crate::EventBus) operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The handler type is already subscribed to this event type.
    #[error("handler type {handler} is already registered for {event_type}")]
    DuplicateSubscription {
        event_type: String,
        handler: &'static str,
    },

    /// Two distinct Rust types claim the same event type name.
    #[error("event type {event_type} is already bound to {existing}, cannot bind {attempted}")]
    EventTypeConflict {
        event_type: String,
        existing: &'static str,
        attempted: &'static str,
    },

    /// A message arrived for an event type with no catalog entry.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload could not be decoded into the registered event shape.
    #[error("failed to deserialize {event_type}: {source}")]
    Deserialization {
        event_type: String,
        #[source]
        source: CodecError,
    },

    /// The event could not be encoded for publishing.
    #[error("failed to serialize {event_type}: {source}")]
    Serialization {
        event_type: String,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A handler failed while processing a delivered event.
    #[error("handler {handler} failed on {event_type}: {source}")]
    Handler {
        event_type: String,
        handler: &'static str,
        #[source]
        source: HandlerError,
    },

    /// A handler panicked while processing a delivered event.
    #[error("handler {handler} panicked on {event_type}: {message}")]
    HandlerPanicked {
        event_type: String,
        handler: &'static str,
        message: String,
    },

    #[error("registry lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// Error returned by event handlers.
///
/// Handlers run inside a consumer loop, so these never reach the publisher.
/// They are reported to the bus's [`DispatchObserver`](crate::DispatchObserver).
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Business logic rejected the event.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("handler error: {0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        HandlerError::Rejected(reason.into())
    }
}
