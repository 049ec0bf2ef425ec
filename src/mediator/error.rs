//! Error types for command dispatch.

use thiserror::Error;

use crate::error::HandlerError;

/// Error type for [`Mediator::send`](super::Mediator::send).
#[derive(Debug, Error)]
pub enum MediatorError {
    /// No handler registered for this command type.
    #[error("handler not found for command {0}")]
    HandlerNotFound(&'static str),
    /// Guard rejected the command before it reached the handler.
    #[error("guard rejected command {0}")]
    GuardRejected(&'static str),
    /// The handler ran and failed.
    #[error("command {command} failed: {source}")]
    Handler {
        command: &'static str,
        #[source]
        source: HandlerError,
    },
}
