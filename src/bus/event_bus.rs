//! The event bus: command gateway, publisher, and subscription owner.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::consumer::{ConsumerHandle, ConsumerStats};
use super::dispatcher::Dispatcher;
use super::handler::EventHandler;
use super::observer::{DispatchObserver, TracingObserver};
use super::registry::HandlerRegistry;
use crate::codec::{Codec, JsonCodec};
use crate::config::BusConfig;
use crate::error::BusError;
use crate::mediator::{Mediator, MediatorError};
use crate::message::{short_type_name, Command, Event};
use crate::transport::{Channel, Transport};

/// Event bus over a broker transport and a command mediator.
///
/// - `send_command` forwards a command to the mediator and returns its result.
/// - `publish` encodes an event and sends it to the queue named after its type.
/// - `subscribe` binds a handler type to an event type and, the first time an
///   event type is subscribed, starts the consumer loop for its queue.
///
/// ## Example
///
/// ```ignore
/// let bus = EventBus::new(InMemoryBroker::new(), mediator);
///
/// bus.subscribe::<OrderCreated, SendReceipt>().await?;
/// bus.publish(&OrderCreated { order_id: 42, amount: 10.5 }).await?;
///
/// let accepted = bus.send_command(CreateOrder::new(42)).await?;
///
/// let stats = bus.shutdown().await;
/// ```
pub struct EventBus<T: Transport, M: Mediator, C: Codec = JsonCodec> {
    transport: T,
    mediator: M,
    codec: C,
    config: BusConfig,
    registry: Arc<HandlerRegistry>,
    dispatcher: Arc<Dispatcher>,
    consumers: Mutex<HashMap<String, ConsumerHandle>>,
}

impl<T: Transport, M: Mediator> EventBus<T, M, JsonCodec> {
    /// Create a bus with JSON payloads and default configuration.
    pub fn new(transport: T, mediator: M) -> Self {
        EventBusBuilder::new(transport, mediator).build()
    }

    /// Start configuring a bus.
    pub fn builder(transport: T, mediator: M) -> EventBusBuilder<T, M, JsonCodec> {
        EventBusBuilder::new(transport, mediator)
    }
}

impl<T: Transport, M: Mediator, C: Codec> EventBus<T, M, C> {
    /// Forward a command to the mediator and return its handler's result.
    ///
    /// Mediator errors, including a missing handler, come back unchanged.
    pub async fn send_command<Cmd: Command>(
        &self,
        command: Cmd,
    ) -> Result<Cmd::Response, MediatorError> {
        tracing::debug!(command = Cmd::command_type(), "sending command");
        self.mediator.send(command).await
    }

    /// Publish an event to the queue named after its type.
    ///
    /// Opens a channel for the call and releases it afterwards. Transport
    /// failures come back as [`BusError::Transport`]; nothing is retried.
    pub async fn publish<E: Event>(&self, event: &E) -> Result<(), BusError> {
        let event_type = E::event_type();
        let mut channel = self.transport.open_channel().await?;
        let sent = self.publish_on(channel.as_mut(), event_type, event).await;
        let closed = channel.close().await;
        sent?;
        closed?;
        tracing::debug!(event_type, "event published");
        Ok(())
    }

    async fn publish_on<E: Event>(
        &self,
        channel: &mut dyn Channel,
        event_type: &str,
        event: &E,
    ) -> Result<(), BusError> {
        channel
            .declare_queue(event_type, self.config.queue_options())
            .await?;
        let payload = self
            .codec
            .encode(event)
            .map_err(|source| BusError::Serialization {
                event_type: event_type.to_string(),
                source,
            })?;
        channel.publish(event_type, payload).await?;
        Ok(())
    }

    /// Bind handler type `H` to event type `E`.
    ///
    /// Each delivered `E` is decoded once and handed to a fresh `H::default()`
    /// after every handler registered before `H`. Subscribing the same handler
    /// type twice fails with [`BusError::DuplicateSubscription`], after
    /// restarting the event type's consumer loop if it was stopped.
    ///
    /// If the consumer loop cannot be started the binding is undone, so the
    /// same subscription can be retried.
    pub async fn subscribe<E, H>(&self) -> Result<(), BusError>
    where
        E: Event,
        H: EventHandler<E> + Default,
    {
        let event_type = E::event_type();
        match self.registry.register::<E, H, C>(self.codec.clone()) {
            Ok(_) => {}
            Err(duplicate @ BusError::DuplicateSubscription { .. }) => {
                self.ensure_consumer(event_type).await?;
                return Err(duplicate);
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = self.ensure_consumer(event_type).await {
            if let Err(rollback) = self.registry.unregister::<E, H>() {
                tracing::warn!(event_type, error = %rollback, "could not undo subscription");
            }
            return Err(e);
        }
        tracing::info!(event_type, handler = short_type_name::<H>(), "subscribed");
        Ok(())
    }

    /// Start the consumer loop for an event type unless one is running.
    async fn ensure_consumer(&self, event_type: &str) -> Result<(), BusError> {
        let mut consumers = self.consumers.lock().await;
        if consumers
            .get(event_type)
            .is_some_and(ConsumerHandle::is_running)
        {
            return Ok(());
        }

        let handle = ConsumerHandle::start(
            &self.transport,
            event_type,
            self.config.queue_options(),
            Arc::clone(&self.dispatcher),
            self.config.drain_on_shutdown,
        )
        .await?;
        if let Some(stale) = consumers.insert(event_type.to_string(), handle) {
            tracing::warn!(event_type, "replacing stopped consumer");
            stale.stop().await;
        }
        Ok(())
    }

    /// Names of the handler types bound to an event type, in invocation order.
    pub fn subscriptions(&self, event_type: &str) -> Result<Vec<&'static str>, BusError> {
        self.registry.handler_names(event_type)
    }

    /// Counters of the consumer loop for an event type, if one was started.
    pub async fn consumer_stats(&self, event_type: &str) -> Option<ConsumerStats> {
        self.consumers
            .lock()
            .await
            .get(event_type)
            .map(ConsumerHandle::stats)
    }

    /// Event types with a consumer loop, sorted.
    pub async fn consumed_event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.consumers.lock().await.keys().cloned().collect();
        types.sort();
        types
    }

    /// Stop every consumer loop and return their final counters.
    ///
    /// Subscriptions stay registered; a later `subscribe` restarts the loop
    /// for its event type.
    pub async fn shutdown(&self) -> HashMap<String, ConsumerStats> {
        let consumers: Vec<(String, ConsumerHandle)> =
            self.consumers.lock().await.drain().collect();

        let mut stats = HashMap::with_capacity(consumers.len());
        for (event_type, handle) in consumers {
            stats.insert(event_type, handle.stop().await);
        }
        tracing::info!(consumers = stats.len(), "event bus shut down");
        stats
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn mediator(&self) -> &M {
        &self.mediator
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

/// Builder for [`EventBus`].
pub struct EventBusBuilder<T, M, C> {
    transport: T,
    mediator: M,
    codec: C,
    config: BusConfig,
    observer: Arc<dyn DispatchObserver>,
}

impl<T: Transport, M: Mediator> EventBusBuilder<T, M, JsonCodec> {
    pub fn new(transport: T, mediator: M) -> Self {
        Self {
            transport,
            mediator,
            codec: JsonCodec,
            config: BusConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }
}

impl<T: Transport, M: Mediator, C: Codec> EventBusBuilder<T, M, C> {
    /// Use a different payload codec.
    pub fn codec<C2: Codec>(self, codec: C2) -> EventBusBuilder<T, M, C2> {
        EventBusBuilder {
            transport: self.transport,
            mediator: self.mediator,
            codec,
            config: self.config,
            observer: self.observer,
        }
    }

    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive dispatch failures (when the failure policy is `Log`).
    pub fn observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> EventBus<T, M, C> {
        let registry = Arc::new(HandlerRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            self.observer,
            self.config.failure_policy,
        ));

        EventBus {
            transport: self.transport,
            mediator: self.mediator,
            codec: self.codec,
            config: self.config,
            registry,
            dispatcher,
            consumers: Mutex::new(HashMap::new()),
        }
    }
}
