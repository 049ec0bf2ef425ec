//! Publishing: queue addressing, codecs, and transport failures.

#[cfg(feature = "bitcode")]
use micro_bus::{BitcodeCodec, BusConfig, EventBus, InMemoryBroker, InMemoryMediator};
use micro_bus::{BusError, Codec, JsonCodec, TransportError};

use crate::support::{bus, OrderCreated};
#[cfg(feature = "bitcode")]
use crate::support::{calls, eventually, Shipping};

#[tokio::test]
async fn publish_without_subscribers_succeeds() {
    let bus = bus();

    bus.publish(&OrderCreated {
        order_id: 5001,
        amount: 1.0,
    })
    .await
    .unwrap();

    assert_eq!(bus.transport().queue_names(), vec!["OrderCreated"]);
    assert_eq!(bus.transport().pending("OrderCreated"), 1);
    assert!(bus.consumer_stats("OrderCreated").await.is_none());
}

#[tokio::test]
async fn payload_is_the_encoded_event() {
    let bus = bus();
    let event = OrderCreated {
        order_id: 5002,
        amount: 10.5,
    };
    bus.publish(&event).await.unwrap();

    let messages = bus.transport().messages_for("OrderCreated");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].routing_key, "OrderCreated");
    assert_eq!(
        JsonCodec.decode::<OrderCreated>(&messages[0].payload).unwrap(),
        event
    );
}

#[tokio::test]
async fn transport_failure_reaches_the_caller() {
    let bus = bus();
    bus.transport().fail_publishes(true);

    let result = bus
        .publish(&OrderCreated {
            order_id: 5003,
            amount: 1.0,
        })
        .await;

    assert!(matches!(
        result,
        Err(BusError::Transport(TransportError::Rejected(_)))
    ));
    assert!(bus.transport().is_empty());
}

#[cfg(feature = "bitcode")]
#[tokio::test]
async fn bitcode_bus_round_trips_through_handlers() {
    let bus = EventBus::builder(InMemoryBroker::new(), InMemoryMediator::new())
        .codec(BitcodeCodec)
        .config(BusConfig {
            durable_queues: true,
            ..BusConfig::default()
        })
        .build();
    bus.subscribe::<OrderCreated, Shipping>().await.unwrap();

    let event = OrderCreated {
        order_id: 5004,
        amount: 2.5,
    };
    bus.publish(&event).await.unwrap();

    eventually(|| calls(5004) == vec!["Shipping"]).await;
    let payload = &bus.transport().messages_for("OrderCreated")[0].payload;
    assert_eq!(BitcodeCodec.decode::<OrderCreated>(payload).unwrap(), event);
    assert_ne!(payload, &JsonCodec.encode(&event).unwrap());
    assert!(bus.transport().queue_options("OrderCreated").unwrap().durable);
}
