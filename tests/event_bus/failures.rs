//! Per-message failure isolation.

use std::sync::Arc;

use micro_bus::transport::Channel;
use micro_bus::{
    BusConfig, EventBus, FailurePolicy, InMemoryBroker, InMemoryMediator, RecordingObserver,
    Transport,
};

use crate::support::{
    calls, eventually, settle, Billing, FraudCheck, OrderCreated, Shipping, Volatile,
};

fn observed_bus(
    policy: FailurePolicy,
) -> (EventBus<InMemoryBroker, InMemoryMediator>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let bus = EventBus::builder(InMemoryBroker::new(), InMemoryMediator::new())
        .config(BusConfig {
            failure_policy: policy,
            ..BusConfig::default()
        })
        .observer(observer.clone())
        .build();
    (bus, observer)
}

async fn inject(broker: &InMemoryBroker, queue: &str, payload: &[u8]) {
    let mut channel = broker.open_channel().await.unwrap();
    channel.publish(queue, payload.to_vec()).await.unwrap();
}

// ============================================================================
// Test 1: A malformed message does not stop the consumer loop
// ============================================================================

#[tokio::test]
async fn malformed_message_is_dropped_and_loop_continues() {
    let (bus, observer) = observed_bus(FailurePolicy::Log);
    bus.subscribe::<OrderCreated, Billing>().await.unwrap();

    inject(bus.transport(), "OrderCreated", b"{\"order_id\": \"oops\"").await;
    bus.publish(&OrderCreated {
        order_id: 6001,
        amount: 4.0,
    })
    .await
    .unwrap();

    eventually(|| calls(6001) == vec!["Billing"]).await;
    let stats = bus.consumer_stats("OrderCreated").await.unwrap();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.handled, 1);

    assert_eq!(observer.failures(), vec!["OrderCreated".to_string()]);
    assert!(observer.errors()[0].contains("failed to deserialize OrderCreated"));
}

// ============================================================================
// Test 2: A failing handler stops later handlers for that message only
// ============================================================================

#[tokio::test]
async fn handler_failure_is_isolated_to_its_message() {
    let (bus, observer) = observed_bus(FailurePolicy::Log);
    bus.subscribe::<OrderCreated, FraudCheck>().await.unwrap();
    bus.subscribe::<OrderCreated, Shipping>().await.unwrap();

    bus.publish(&OrderCreated {
        order_id: 6002,
        amount: -1.0,
    })
    .await
    .unwrap();
    bus.publish(&OrderCreated {
        order_id: 6003,
        amount: 9.0,
    })
    .await
    .unwrap();

    eventually(|| calls(6003).len() == 2).await;
    settle().await;

    assert!(calls(6002).is_empty());
    assert_eq!(calls(6003), vec!["FraudCheck", "Shipping"]);
    assert_eq!(observer.errors().len(), 1);
    assert!(observer.errors()[0].contains("handler FraudCheck failed"));
}

// ============================================================================
// Test 3: Discard policy keeps failures away from the observer
// ============================================================================

#[tokio::test]
async fn discard_policy_drops_silently() {
    let (bus, observer) = observed_bus(FailurePolicy::Discard);
    bus.subscribe::<OrderCreated, Billing>().await.unwrap();

    inject(bus.transport(), "OrderCreated", b"garbage").await;
    bus.publish(&OrderCreated {
        order_id: 6004,
        amount: 1.0,
    })
    .await
    .unwrap();

    eventually(|| calls(6004) == vec!["Billing"]).await;
    assert!(observer.failures().is_empty());
    assert_eq!(bus.consumer_stats("OrderCreated").await.unwrap().failed, 1);
}

// ============================================================================
// Test 4: A panicking handler counts as a failed message
// ============================================================================

#[tokio::test]
async fn panicking_handler_is_reported_and_loop_continues() {
    let (bus, observer) = observed_bus(FailurePolicy::Log);
    bus.subscribe::<OrderCreated, Volatile>().await.unwrap();
    bus.subscribe::<OrderCreated, Billing>().await.unwrap();

    bus.publish(&OrderCreated {
        order_id: 6005,
        amount: 5000.0,
    })
    .await
    .unwrap();
    bus.publish(&OrderCreated {
        order_id: 6006,
        amount: 2.0,
    })
    .await
    .unwrap();

    eventually(|| calls(6006).len() == 2).await;
    eventually(|| observer.failures().len() == 1).await;
    settle().await;

    assert!(calls(6005).is_empty());
    assert_eq!(calls(6006), vec!["Volatile", "Billing"]);
    assert!(observer.errors()[0].contains("handler Volatile panicked on OrderCreated"));

    let stats = bus.consumer_stats("OrderCreated").await.unwrap();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.handled, 1);
    assert_eq!(stats.failed, 1);
}
