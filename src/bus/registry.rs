//! Handler registry and event type catalog.
//!
//! Maps each event type name to the ordered list of handler types subscribed
//! to it, and to the shape needed to decode its payloads. Both maps are
//! append-only and updated together under one lock.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::handler::{Activate, Activator, AnyEvent, EventHandler};
use crate::codec::{Codec, CodecError};
use crate::error::BusError;
use crate::message::{short_type_name, Event};

type Decode = dyn Fn(&[u8]) -> Result<Box<AnyEvent>, CodecError> + Send + Sync;

/// One handler type bound to an event type.
#[derive(Clone)]
pub(crate) struct HandlerBinding {
    handler_type: TypeId,
    handler_name: &'static str,
    activator: Arc<dyn Activate>,
}

impl HandlerBinding {
    pub(crate) fn name(&self) -> &'static str {
        self.handler_name
    }

    pub(crate) fn activator(&self) -> &dyn Activate {
        self.activator.as_ref()
    }
}

/// The concrete type behind an event type name.
#[derive(Clone)]
pub(crate) struct EventShape {
    type_id: TypeId,
    type_name: &'static str,
    decode: Arc<Decode>,
}

impl EventShape {
    fn of<E: Event, C: Codec>(codec: C) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            decode: Arc::new(move |bytes: &[u8]| {
                codec
                    .decode::<E>(bytes)
                    .map(|event| Box::new(event) as Box<AnyEvent>)
            }),
        }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<Box<AnyEvent>, CodecError> {
        (self.decode)(bytes)
    }
}

#[derive(Default)]
struct RegistryState {
    handlers: HashMap<String, Vec<HandlerBinding>>,
    catalog: HashMap<String, EventShape>,
}

/// Process-wide subscription state owned by one bus.
///
/// Reads happen on every dispatch; writes only on subscribe. A
/// reader-writer lock lets consumer loops keep dispatching while new
/// subscriptions land.
#[derive(Default)]
pub struct HandlerRegistry {
    state: RwLock<RegistryState>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>, BusError> {
        self.state
            .read()
            .map_err(|_| BusError::LockPoisoned("registry read"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>, BusError> {
        self.state
            .write()
            .map_err(|_| BusError::LockPoisoned("registry write"))
    }

    /// Bind handler type `H` to event type `E`.
    ///
    /// Returns `true` when this is the first handler for the event type.
    /// Fails with [`BusError::DuplicateSubscription`] if `H` is already bound
    /// to `E`, and with [`BusError::EventTypeConflict`] if another Rust type
    /// already owns `E`'s name.
    pub(crate) fn register<E, H, C>(&self, codec: C) -> Result<bool, BusError>
    where
        E: Event,
        H: EventHandler<E> + Default,
        C: Codec,
    {
        let event_type = E::event_type();
        let handler_type = TypeId::of::<H>();
        let handler_name = short_type_name::<H>();

        let mut state = self.write()?;

        if let Some(shape) = state.catalog.get(event_type) {
            if shape.type_id != TypeId::of::<E>() {
                return Err(BusError::EventTypeConflict {
                    event_type: event_type.to_string(),
                    existing: shape.type_name,
                    attempted: std::any::type_name::<E>(),
                });
            }
        }

        let bindings = state.handlers.entry(event_type.to_string()).or_default();
        if bindings.iter().any(|b| b.handler_type == handler_type) {
            return Err(BusError::DuplicateSubscription {
                event_type: event_type.to_string(),
                handler: handler_name,
            });
        }

        let first = bindings.is_empty();
        bindings.push(HandlerBinding {
            handler_type,
            handler_name,
            activator: Arc::new(Activator::<E, H>::new()),
        });
        state
            .catalog
            .entry(event_type.to_string())
            .or_insert_with(|| EventShape::of::<E, C>(codec));

        Ok(first)
    }

    /// Remove handler type `H` from event type `E`.
    ///
    /// Drops the catalog entry once no handler is left for the event type.
    /// Returns whether a binding was removed.
    pub(crate) fn unregister<E: Event, H: 'static>(&self) -> Result<bool, BusError> {
        let event_type = E::event_type();
        let handler_type = TypeId::of::<H>();
        let mut state = self.write()?;

        let Some(bindings) = state.handlers.get_mut(event_type) else {
            return Ok(false);
        };
        let before = bindings.len();
        bindings.retain(|b| b.handler_type != handler_type);
        let removed = bindings.len() != before;

        if bindings.is_empty() {
            state.handlers.remove(event_type);
            state.catalog.remove(event_type);
        }
        Ok(removed)
    }

    /// Handlers bound to an event type, in registration order.
    pub(crate) fn lookup(&self, event_type: &str) -> Result<Vec<HandlerBinding>, BusError> {
        Ok(self
            .read()?
            .handlers
            .get(event_type)
            .cloned()
            .unwrap_or_default())
    }

    /// Decoding shape for an event type.
    pub(crate) fn resolve_shape(&self, event_type: &str) -> Result<EventShape, BusError> {
        self.read()?
            .catalog
            .get(event_type)
            .cloned()
            .ok_or_else(|| BusError::UnknownEventType(event_type.to_string()))
    }

    /// Names of the handler types bound to an event type, in invocation order.
    pub fn handler_names(&self, event_type: &str) -> Result<Vec<&'static str>, BusError> {
        Ok(self
            .read()?
            .handlers
            .get(event_type)
            .map(|bindings| bindings.iter().map(HandlerBinding::name).collect())
            .unwrap_or_default())
    }

    /// All event types with at least one subscription, sorted.
    pub fn event_types(&self) -> Result<Vec<String>, BusError> {
        let mut types: Vec<String> = self.read()?.catalog.keys().cloned().collect();
        types.sort();
        Ok(types)
    }

    pub fn contains(&self, event_type: &str) -> Result<bool, BusError> {
        Ok(self.read()?.handlers.contains_key(event_type))
    }
}
