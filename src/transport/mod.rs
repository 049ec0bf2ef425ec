//! Broker transport abstraction.
//!
//! The bus addresses the broker through named queues only: one queue per
//! event type, named after the event type. A [`Transport`] hands out
//! [`Channel`]s; every publish call and every consumer loop opens its own
//! channel and never shares it.
//!
//! ```text
//! ┌──────────────┐  open_channel   ┌──────────────────────────────┐
//! │   EventBus   │ ──────────────▶ │ Channel                      │
//! │  publish()   │                 │  declare_queue(name, opts)   │
//! │  subscribe() │                 │  publish(name, bytes)        │
//! └──────────────┘                 │  consume(name) -> stream     │
//!                                  └──────────────────────────────┘
//!                                        │              │
//!                                        ▼              ▼
//!                                ┌──────────────┐ ┌──────────────┐
//!                                │InMemoryBroker│ │ AMQP client  │
//!                                │  (included)  │ │  (external)  │
//!                                └──────────────┘ └──────────────┘
//! ```

mod channel;
mod in_memory;

pub use channel::{Channel, MessageStream, QueueOptions, RawMessage, Transport, TransportError};
pub use in_memory::InMemoryBroker;
