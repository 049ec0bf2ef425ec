//! Event handler contract and its type-erased activator.

use std::any::Any;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::HandlerError;
use crate::message::Event;

/// Handles one event type.
///
/// The bus builds a fresh `H::default()` for every message, so handlers hold
/// no per-message state between invocations.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct SendReceipt;
///
/// #[async_trait]
/// impl EventHandler<OrderCreated> for SendReceipt {
///     async fn handle(&self, event: &OrderCreated) -> Result<(), HandlerError> {
///         mailer().send_receipt(event.order_id).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    async fn handle(&self, event: &E) -> Result<(), HandlerError>;
}

pub(crate) type AnyEvent = dyn Any + Send + Sync;

/// Constructs a handler and feeds it a decoded event.
pub(crate) trait Activate: Send + Sync {
    /// `None` if `event` is not the type this activator was built for.
    fn activate<'a>(
        &'a self,
        event: &'a AnyEvent,
    ) -> Option<BoxFuture<'a, Result<(), HandlerError>>>;
}

pub(crate) struct Activator<E, H>(PhantomData<fn() -> (E, H)>);

impl<E, H> Activator<E, H> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E, H> Activate for Activator<E, H>
where
    E: Event,
    H: EventHandler<E> + Default,
{
    fn activate<'a>(
        &'a self,
        event: &'a AnyEvent,
    ) -> Option<BoxFuture<'a, Result<(), HandlerError>>> {
        let event = event.downcast_ref::<E>()?;
        Some(Box::pin(async move { H::default().handle(event).await }))
    }
}
