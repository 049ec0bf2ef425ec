//! Message dispatch: decode, resolve handlers, invoke.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::Instrument;

use super::observer::{DispatchFailure, DispatchObserver};
use super::registry::HandlerRegistry;
use crate::config::FailurePolicy;
use crate::error::BusError;
use crate::transport::RawMessage;

/// What a successful dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing is subscribed to the event type; the message was dropped.
    NoSubscribers,
    /// Every bound handler ran to completion.
    Handled { handlers: usize },
}

/// Turns raw broker messages into handler invocations.
///
/// Handlers bound to one event type run one after another, in registration
/// order. The first failure ends the dispatch; later handlers do not see the
/// message.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    observer: Arc<dyn DispatchObserver>,
    policy: FailurePolicy,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        observer: Arc<dyn DispatchObserver>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            registry,
            observer,
            policy,
        }
    }

    /// Process one message, surfacing any failure to the caller.
    ///
    /// A panicking handler is caught and reported as
    /// [`BusError::HandlerPanicked`], like any other handler failure.
    pub async fn process_message(
        &self,
        event_type: &str,
        payload: &[u8],
    ) -> Result<DispatchOutcome, BusError> {
        let bindings = self.registry.lookup(event_type)?;
        if bindings.is_empty() {
            return Ok(DispatchOutcome::NoSubscribers);
        }

        let shape = self.registry.resolve_shape(event_type)?;
        let event = shape
            .decode(payload)
            .map_err(|source| BusError::Deserialization {
                event_type: event_type.to_string(),
                source,
            })?;

        for binding in &bindings {
            let invocation = binding
                .activator()
                .activate(event.as_ref())
                .ok_or_else(|| BusError::UnknownEventType(event_type.to_string()))?;

            let span = tracing::debug_span!("handler", handler = binding.name());
            AssertUnwindSafe(invocation.instrument(span))
                .catch_unwind()
                .await
                .map_err(|panic| BusError::HandlerPanicked {
                    event_type: event_type.to_string(),
                    handler: binding.name(),
                    message: panic_message(panic.as_ref()),
                })?
                .map_err(|source| BusError::Handler {
                    event_type: event_type.to_string(),
                    handler: binding.name(),
                    source,
                })?;
        }

        Ok(DispatchOutcome::Handled {
            handlers: bindings.len(),
        })
    }

    /// Process one message as a consumer loop does: failures are reported
    /// according to the failure policy and never propagate further.
    ///
    /// The message counts as consumed either way; nothing is retried.
    pub async fn dispatch(&self, message: RawMessage) -> Result<DispatchOutcome, DispatchFailure> {
        match self
            .process_message(&message.routing_key, &message.payload)
            .await
        {
            Ok(outcome) => {
                tracing::trace!(event_type = %message.routing_key, ?outcome, "dispatched");
                Ok(outcome)
            }
            Err(error) => {
                let failure = DispatchFailure {
                    event_type: message.routing_key,
                    error,
                };
                if self.policy == FailurePolicy::Log {
                    self.observer.on_failure(&failure);
                }
                Err(failure)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
