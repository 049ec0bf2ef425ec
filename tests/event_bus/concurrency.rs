//! Dispatches for one event type overlap.

use crate::support::{bus, calls, eventually, ShipmentDispatched, Tracker};

#[tokio::test]
async fn slow_message_does_not_block_the_next() {
    let bus = bus();
    bus.subscribe::<ShipmentDispatched, Tracker>().await.unwrap();

    bus.publish(&ShipmentDispatched {
        shipment_id: 7001,
        delay_ms: 500,
    })
    .await
    .unwrap();
    bus.publish(&ShipmentDispatched {
        shipment_id: 7002,
        delay_ms: 0,
    })
    .await
    .unwrap();

    eventually(|| calls(7002) == vec!["Tracker"]).await;
    // The first shipment is still sleeping in its handler.
    assert!(calls(7001).is_empty());

    eventually(|| calls(7001) == vec!["Tracker"]).await;
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_dispatches() {
    let bus = bus();
    bus.subscribe::<ShipmentDispatched, Tracker>().await.unwrap();

    bus.publish(&ShipmentDispatched {
        shipment_id: 7003,
        delay_ms: 100,
    })
    .await
    .unwrap();
    // Let the loop take the delivery; the handler is now sleeping.
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert!(calls(7003).is_empty());

    let stats = bus.shutdown().await;
    assert_eq!(calls(7003), vec!["Tracker"]);
    assert_eq!(stats["ShipmentDispatched"].handled, 1);
}
