//! Command gateway through the mediator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use micro_bus::{EventBus, InMemoryBroker, InMemoryMediator, MediatorError};

use crate::support::{CancelOrder, CreateOrder};

#[tokio::test]
async fn send_command_returns_handler_result() {
    let mediator = InMemoryMediator::new()
        .command(|cmd: CreateOrder| async move { Ok(cmd.amount > 0.0) });
    let bus = EventBus::new(InMemoryBroker::new(), mediator);

    assert!(bus.send_command(CreateOrder::new(1, 10.5)).await.unwrap());
    assert!(!bus.send_command(CreateOrder::new(2, 0.0)).await.unwrap());
}

#[tokio::test]
async fn command_without_handler_fails_with_not_found() {
    let mediator = InMemoryMediator::new()
        .command(|_: CreateOrder| async move { Ok(true) });
    let bus = EventBus::new(InMemoryBroker::new(), mediator);

    let result = bus.send_command(CancelOrder { order_id: 1 }).await;
    assert!(matches!(result, Err(MediatorError::HandlerNotFound("CancelOrder"))));
}

#[tokio::test]
async fn exactly_one_handler_runs_per_command() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let mediator = InMemoryMediator::new().command(move |_: CancelOrder| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    });
    let bus = EventBus::new(InMemoryBroker::new(), mediator);

    bus.send_command(CancelOrder { order_id: 9 }).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    // Commands never touch the broker.
    assert!(bus.transport().is_empty());
}

#[tokio::test]
async fn command_carries_its_stamp() {
    let command = CreateOrder::new(3, 1.0);
    assert_eq!(command.stamp.message_type, "CreateOrder");

    let mediator = InMemoryMediator::new().command(|cmd: CreateOrder| async move {
        Ok(cmd.stamp.timestamp <= chrono::Utc::now())
    });
    let bus = EventBus::new(InMemoryBroker::new(), mediator);
    assert!(bus.send_command(command).await.unwrap());
}
