//! Message contracts: events, commands, and the stamp they carry.
//!
//! Commands and events are both messages; the distinction is in how they're
//! routed. `publish/subscribe` fans events out through broker queues named
//! after the event type, `send_command` routes a command to exactly one
//! handler through the mediator.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A past-tense fact broadcast to zero or more handlers.
///
/// The event type name doubles as the broker queue name and the registry key,
/// so two unrelated event types sharing a name will collide. Override
/// [`Event::event_type`] to disambiguate.
///
/// ```
/// use micro_bus::Event;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct OrderCreated {
///     order_id: u64,
/// }
///
/// impl Event for OrderCreated {}
///
/// assert_eq!(OrderCreated::event_type(), "OrderCreated");
/// ```
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Declared type name of the event, without module path or generics.
    fn event_type() -> &'static str {
        short_type_name::<Self>()
    }
}

/// An imperative request routed to exactly one handler.
pub trait Command: Send + Sync + 'static {
    /// Value produced by the command's handler.
    type Response: Send + 'static;

    /// Declared type name of the command.
    fn command_type() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }
}

/// Type name and creation time of a message.
///
/// Embed it in commands and events that need to carry when they were raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStamp {
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageStamp {
    /// Stamp a message of type `T` with the current time.
    pub fn of<T>() -> Self {
        Self {
            message_type: short_type_name::<T>().to_string(),
            timestamp: Utc::now(),
        }
    }
}

pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
