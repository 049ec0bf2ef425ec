//! Order flow over the in-memory broker.
//!
//! Run with `RUST_LOG=micro_bus=debug cargo run --example order_flow`.

use std::time::Duration;

use micro_bus::{
    async_trait, BusConfig, Command, Event, EventBus, EventHandler, HandlerError,
    InMemoryBroker, InMemoryMediator, MessageStamp,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct OrderCreated {
    order_id: u64,
    amount: f64,
}

impl Event for OrderCreated {}

#[derive(Default)]
struct ReserveStock;

#[async_trait]
impl EventHandler<OrderCreated> for ReserveStock {
    async fn handle(&self, event: &OrderCreated) -> Result<(), HandlerError> {
        tracing::info!(order_id = event.order_id, "stock reserved");
        Ok(())
    }
}

#[derive(Default)]
struct ChargeCard;

#[async_trait]
impl EventHandler<OrderCreated> for ChargeCard {
    async fn handle(&self, event: &OrderCreated) -> Result<(), HandlerError> {
        if event.amount <= 0.0 {
            return Err(HandlerError::rejected("nothing to charge"));
        }
        tracing::info!(order_id = event.order_id, amount = event.amount, "card charged");
        Ok(())
    }
}

struct CreateOrder {
    stamp: MessageStamp,
    order_id: u64,
    amount: f64,
}

impl Command for CreateOrder {
    type Response = bool;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let broker = InMemoryBroker::new();
    let mediator = InMemoryMediator::new().command(|cmd: CreateOrder| async move {
        tracing::info!(
            order_id = cmd.order_id,
            at = %cmd.stamp.timestamp,
            "creating order"
        );
        Ok(cmd.amount > 0.0)
    });

    let bus = EventBus::builder(broker, mediator)
        .config(BusConfig::from_env()?)
        .build();

    bus.subscribe::<OrderCreated, ReserveStock>().await?;
    bus.subscribe::<OrderCreated, ChargeCard>().await?;

    for (order_id, amount) in [(1, 10.5), (2, 0.0)] {
        let accepted = bus
            .send_command(CreateOrder {
                stamp: MessageStamp::of::<CreateOrder>(),
                order_id,
                amount,
            })
            .await?;
        tracing::info!(order_id, accepted, "command handled");
        bus.publish(&OrderCreated { order_id, amount }).await?;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    for (event_type, stats) in bus.shutdown().await {
        tracing::info!(event_type = %event_type, ?stats, "consumer finished");
    }
    Ok(())
}
