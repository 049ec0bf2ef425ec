//! A minimal event bus over a message broker and a command mediator.
//!
//! - **Commands** go through [`EventBus::send_command`] to the one handler the
//!   [`Mediator`] holds for their type, and the caller awaits the result.
//! - **Events** go through [`EventBus::publish`] to a broker queue named after
//!   the event type. Every event type with a subscription has its own consumer
//!   loop, which decodes each delivery and runs the subscribed handlers.

pub mod bus;
pub mod codec;
mod config;
mod error;
pub mod mediator;
mod message;
pub mod transport;

pub use bus::{
    ConsumerStats, DispatchFailure, DispatchObserver, DispatchOutcome, EventBus, EventBusBuilder,
    EventHandler, RecordingObserver, TracingObserver,
};
#[cfg(feature = "bitcode")]
pub use codec::BitcodeCodec;
pub use codec::{Codec, CodecError, JsonCodec};
pub use config::{BusConfig, ConfigError, FailurePolicy};
pub use error::{BusError, HandlerError};
pub use mediator::{CommandHandler, InMemoryMediator, Mediator, MediatorError};
pub use message::{Command, Event, MessageStamp};
pub use transport::{InMemoryBroker, RawMessage, Transport, TransportError};

// Re-exported so handler implementations don't need a direct dependency.
pub use async_trait::async_trait;
