//! Event Bus - subscriptions, publishing, and dispatch
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    EventBus (per service)                    │
//! │  send_command() ─▶ Mediator                                 │
//! │  publish()      ─▶ Transport (queue = event type name)      │
//! │  subscribe()    ─▶ HandlerRegistry + one ConsumerHandle     │
//! │                    per event type                           │
//! └─────────────────────────────────────────────────────────────┘
//!                            │ deliveries
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Dispatcher                             │
//! │  decode payload ─▶ handlers in registration order           │
//! │  failures ─▶ DispatchObserver (never back into the loop)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod consumer;
mod dispatcher;
mod event_bus;
mod handler;
mod observer;
mod registry;

pub use consumer::{ConsumerHandle, ConsumerStats};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use event_bus::{EventBus, EventBusBuilder};
pub use handler::EventHandler;
pub use observer::{DispatchFailure, DispatchObserver, RecordingObserver, TracingObserver};
pub use registry::HandlerRegistry;
