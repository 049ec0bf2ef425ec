//! Command dispatch.
//!
//! The bus forwards commands to a [`Mediator`], which routes each command to
//! the single handler registered for its type and returns the handler's
//! response. The bus keeps no command registry of its own.
//!
//! ## Quick Start
//!
//! ```ignore
//! let mediator = InMemoryMediator::new()
//!     .command(|cmd: CreateOrder| async move { Ok(cmd.amount > 0.0) });
//!
//! let accepted = mediator.send(CreateOrder { amount: 10.5 }).await?;
//! ```

mod error;
mod in_memory;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::message::Command;

pub use error::MediatorError;
pub use in_memory::InMemoryMediator;

/// Routes a command to its one registered handler.
#[async_trait]
pub trait Mediator: Send + Sync + 'static {
    async fn send<C: Command>(&self, command: C) -> Result<C::Response, MediatorError>;
}

/// Handles one command type.
///
/// Implemented for async closures `Fn(C) -> impl Future<Output = Result<C::Response, HandlerError>>`.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    async fn handle(&self, command: C) -> Result<C::Response, HandlerError>;
}

#[async_trait]
impl<C, F, Fut> CommandHandler<C> for F
where
    C: Command,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<C::Response, HandlerError>> + Send,
{
    async fn handle(&self, command: C) -> Result<C::Response, HandlerError> {
        (self)(command).await
    }
}
