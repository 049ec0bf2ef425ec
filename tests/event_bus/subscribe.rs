//! Subscription and fan-out to handlers.

use micro_bus::BusError;

use crate::support::{
    bus, calls, eventually, journal, settle, Analytics, Billing, Entry, FraudCheck, OrderCreated,
    Shipping,
};

// ============================================================================
// Test 1: Two handlers receive the event, in registration order
// ============================================================================

#[tokio::test]
async fn handlers_receive_event_in_registration_order() {
    let bus = bus();
    bus.subscribe::<OrderCreated, Billing>().await.unwrap();
    bus.subscribe::<OrderCreated, Shipping>().await.unwrap();

    bus.publish(&OrderCreated {
        order_id: 42,
        amount: 10.5,
    })
    .await
    .unwrap();

    eventually(|| journal(42).len() == 2).await;
    settle().await;
    assert_eq!(
        journal(42),
        vec![
            Entry {
                handler: "Billing",
                id: 42,
                amount: 10.5
            },
            Entry {
                handler: "Shipping",
                id: 42,
                amount: 10.5
            },
        ]
    );
}

// ============================================================================
// Test 2: Duplicate subscription is rejected and not double-invoked
// ============================================================================

#[tokio::test]
async fn duplicate_subscription_is_rejected() {
    let bus = bus();
    bus.subscribe::<OrderCreated, Billing>().await.unwrap();

    let result = bus.subscribe::<OrderCreated, Billing>().await;
    assert!(matches!(
        result,
        Err(BusError::DuplicateSubscription { ref event_type, handler: "Billing" })
            if event_type == "OrderCreated"
    ));
    assert_eq!(bus.subscriptions("OrderCreated").unwrap(), vec!["Billing"]);

    bus.publish(&OrderCreated {
        order_id: 1001,
        amount: 3.0,
    })
    .await
    .unwrap();

    eventually(|| !calls(1001).is_empty()).await;
    settle().await;
    assert_eq!(calls(1001), vec!["Billing"]);
}

// ============================================================================
// Test 3: N handlers, M events -> N * M invocations
// ============================================================================

#[tokio::test]
async fn every_handler_sees_every_event() {
    let bus = bus();
    bus.subscribe::<OrderCreated, Billing>().await.unwrap();
    bus.subscribe::<OrderCreated, Shipping>().await.unwrap();
    bus.subscribe::<OrderCreated, Analytics>().await.unwrap();

    let ids = 2001..2006;
    for id in ids.clone() {
        bus.publish(&OrderCreated {
            order_id: id,
            amount: id as f64,
        })
        .await
        .unwrap();
    }

    eventually(|| ids.clone().all(|id| calls(id).len() == 3)).await;
    settle().await;
    for id in ids {
        assert_eq!(calls(id), vec!["Billing", "Shipping", "Analytics"]);
        assert!(journal(id).iter().all(|e| e.amount == id as f64));
    }

    let stats = bus.consumer_stats("OrderCreated").await.unwrap();
    assert_eq!(stats.received, 5);
    assert_eq!(stats.handled, 5);
}

// ============================================================================
// Test 4: Subscribing while the loop runs takes effect for later messages
// ============================================================================

#[tokio::test]
async fn late_subscription_joins_running_loop() {
    let bus = bus();
    bus.subscribe::<OrderCreated, Billing>().await.unwrap();

    bus.publish(&OrderCreated {
        order_id: 3001,
        amount: 1.0,
    })
    .await
    .unwrap();
    eventually(|| calls(3001) == vec!["Billing"]).await;

    bus.subscribe::<OrderCreated, FraudCheck>().await.unwrap();
    bus.publish(&OrderCreated {
        order_id: 3002,
        amount: 1.0,
    })
    .await
    .unwrap();

    eventually(|| calls(3002).len() == 2).await;
    assert_eq!(calls(3002), vec!["Billing", "FraudCheck"]);
    assert_eq!(bus.consumed_event_types().await, vec!["OrderCreated"]);
    assert_eq!(bus.transport().consumer_count("OrderCreated"), 1);
}

// ============================================================================
// Test 5: Events published before the first subscription are delivered
// ============================================================================

#[tokio::test]
async fn backlog_is_processed_once_subscribed() {
    let bus = bus();
    bus.publish(&OrderCreated {
        order_id: 4001,
        amount: 7.0,
    })
    .await
    .unwrap();
    assert!(calls(4001).is_empty());

    bus.subscribe::<OrderCreated, Shipping>().await.unwrap();
    eventually(|| calls(4001) == vec!["Shipping"]).await;
}
