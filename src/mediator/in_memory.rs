//! In-process mediator: command handler registry and dispatch.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{CommandHandler, Mediator, MediatorError};
use crate::message::Command;

type Guard<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;

/// A registered command handler with optional guard.
struct Route<C: Command> {
    guard: Option<Guard<C>>,
    handler: Arc<dyn CommandHandler<C>>,
}

struct Entry {
    name: &'static str,
    route: Box<dyn Any + Send + Sync>,
}

/// A mediator that routes commands to handlers registered in-process.
///
/// Exactly one handler exists per command type; registering a second
/// handler for the same type replaces the first.
///
/// ## Example
///
/// ```ignore
/// let mediator = InMemoryMediator::new()
///     .command(|cmd: CreateOrder| async move { Ok(true) })
///     .command_guarded(
///         |cmd: &CancelOrder| !cmd.reason.is_empty(),
///         |cmd: CancelOrder| async move { Ok(true) },
///     );
/// ```
#[derive(Default)]
pub struct InMemoryMediator {
    routes: HashMap<TypeId, Entry>,
}

impl InMemoryMediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command handler.
    ///
    /// Returns `self` for chaining.
    pub fn command<C, H>(self, handler: H) -> Self
    where
        C: Command,
        H: CommandHandler<C>,
    {
        self.route(None, handler)
    }

    /// Register a command handler with a guard function.
    ///
    /// The guard is called before the handler. If it returns `false`,
    /// the command is rejected with `MediatorError::GuardRejected`.
    pub fn command_guarded<C, G, H>(self, guard: G, handler: H) -> Self
    where
        C: Command,
        G: Fn(&C) -> bool + Send + Sync + 'static,
        H: CommandHandler<C>,
    {
        self.route(Some(Box::new(guard)), handler)
    }

    fn route<C, H>(mut self, guard: Option<Guard<C>>, handler: H) -> Self
    where
        C: Command,
        H: CommandHandler<C>,
    {
        self.routes.insert(
            TypeId::of::<C>(),
            Entry {
                name: C::command_type(),
                route: Box::new(Route::<C> {
                    guard,
                    handler: Arc::new(handler),
                }),
            },
        );
        self
    }

    /// List registered command type names.
    pub fn commands(&self) -> Vec<&'static str> {
        self.routes.values().map(|e| e.name).collect()
    }
}

#[async_trait]
impl Mediator for InMemoryMediator {
    async fn send<C: Command>(&self, command: C) -> Result<C::Response, MediatorError> {
        let name = C::command_type();
        let route = self
            .routes
            .get(&TypeId::of::<C>())
            .and_then(|e| e.route.downcast_ref::<Route<C>>())
            .ok_or(MediatorError::HandlerNotFound(name))?;

        if let Some(guard) = &route.guard {
            if !guard(&command) {
                return Err(MediatorError::GuardRejected(name));
            }
        }

        tracing::debug!(command = name, "dispatching command");
        route
            .handler
            .handle(command)
            .await
            .map_err(|source| MediatorError::Handler {
                command: name,
                source,
            })
    }
}
