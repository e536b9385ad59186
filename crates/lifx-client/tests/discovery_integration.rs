//! Integration tests for discovery and liveness.
//!
//! The client under test probes a fake device on loopback every 100 ms with a
//! one-second staleness window, so a full discovered → lost → rediscovered
//! cycle fits in a few seconds.

mod common;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use common::{
    loopback_config, respond_with, state_service, state_version, test_mac, FakeDevice, Outgoing,
};
use lifx_client::{DiscoveryEvent, LifxClient};
use lifx_core::{DeviceClass, KnownDevice, MessageType};
use tokio::sync::mpsc::UnboundedReceiver;

/// Answers probes with its own port and version queries with `product`.
fn bulb(port: Arc<OnceLock<u16>>, product: u32) -> common::Handler {
    respond_with(move |request| match MessageType::try_from(request.message_type) {
        Ok(MessageType::DeviceGetService) => vec![Outgoing::reply(
            MessageType::DeviceStateService,
            state_service(port.get().copied().unwrap_or(0)),
        )],
        Ok(MessageType::DeviceGetVersion) => vec![Outgoing::reply(
            MessageType::DeviceStateVersion,
            state_version(product),
        )],
        _ => vec![],
    })
}

async fn spawn_bulb(last: u8, product: u32) -> FakeDevice {
    let port = Arc::new(OnceLock::new());
    let device = FakeDevice::spawn(test_mac(last), bulb(Arc::clone(&port), product)).await;
    let _ = port.set(device.addr.port());
    device
}

async fn next_event(
    events: &mut UnboundedReceiver<DiscoveryEvent>,
    within: Duration,
) -> Option<DiscoveryEvent> {
    tokio::time::timeout(within, events.recv()).await.ok().flatten()
}

async fn expect_discovered(events: &mut UnboundedReceiver<DiscoveryEvent>) -> KnownDevice {
    match next_event(events, Duration::from_secs(2)).await {
        Some(DiscoveryEvent::Discovered(device)) => device,
        other => panic!("expected a discovered event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_reply_is_discovered_and_classified() {
    // Arrange
    let device = spawn_bulb(1, 38).await;
    let (client, mut events) =
        LifxClient::new(loopback_config(device.addr.port(), 500)).expect("client");

    // Act
    client.start_discovery();
    let found = expect_discovered(&mut events).await;

    // Assert
    assert_eq!(found.mac, device.mac);
    assert_eq!(found.endpoint, device.addr);
    assert_eq!(found.class, DeviceClass::MultiZoneStrip);
    assert_eq!(found.product_id, Some(38));
    let known: Vec<_> = client.devices().into_iter().map(|d| d.mac).collect();
    assert_eq!(known, vec![device.mac]);

    let probes = device.received_of(MessageType::DeviceGetService);
    assert!(!probes.is_empty());
    assert_ne!(probes[0].1.header.source, 0);
    assert!(probes[0].1.header.target.is_broadcast());
}

#[tokio::test]
async fn test_repeated_probe_replies_raise_one_discovered_event() {
    // Arrange
    let device = spawn_bulb(2, 1).await;
    let (client, mut events) =
        LifxClient::new(loopback_config(device.addr.port(), 500)).expect("client");

    // Act
    client.start_discovery();
    let found = expect_discovered(&mut events).await;
    tokio::time::sleep(Duration::from_millis(350)).await;

    // Assert
    assert_eq!(found.class, DeviceClass::Light);
    assert!(device.received_of(MessageType::DeviceGetService).len() >= 3);
    assert_eq!(device.received_of(MessageType::DeviceGetVersion).len(), 1);
    assert!(next_event(&mut events, Duration::from_millis(50)).await.is_none());
    assert_eq!(client.devices().len(), 1);
}

#[tokio::test]
async fn test_silent_device_is_lost_then_rediscovered() {
    // Arrange
    let device = spawn_bulb(3, 55).await;
    let (client, mut events) =
        LifxClient::new(loopback_config(device.addr.port(), 500)).expect("client");
    client.start_discovery();
    let found = expect_discovered(&mut events).await;
    assert_eq!(found.class, DeviceClass::TileGroup);

    // Act: go quiet past the one-second window.
    device.set_silent(true);
    let lost = next_event(&mut events, Duration::from_secs(3)).await;

    // Assert
    assert!(matches!(lost, Some(DiscoveryEvent::Lost(ref d)) if d.mac == device.mac));
    assert!(client.devices().is_empty());

    // Act: answer again.
    device.set_silent(false);
    let again = expect_discovered(&mut events).await;

    // Assert
    assert_eq!(again.mac, device.mac);
    assert_eq!(client.devices().len(), 1);
}

#[tokio::test]
async fn test_stop_keeps_directory_and_is_idempotent() {
    // Arrange
    let device = spawn_bulb(4, 70).await;
    let (client, mut events) =
        LifxClient::new(loopback_config(device.addr.port(), 500)).expect("client");
    client.start_discovery();
    client.start_discovery();
    let found = expect_discovered(&mut events).await;

    // Act
    client.stop_discovery();
    client.stop_discovery();
    let probes_at_stop = device.received_of(MessageType::DeviceGetService).len();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Assert
    assert!(!client.is_discovering());
    assert_eq!(found.class, DeviceClass::Switch);
    assert_eq!(client.devices().len(), 1);
    assert!(client.device(&device.mac).is_some());
    assert!(device.received_of(MessageType::DeviceGetService).len() <= probes_at_stop + 1);
    assert!(next_event(&mut events, Duration::from_millis(50)).await.is_none());
}

#[tokio::test]
async fn test_probe_reply_for_another_session_is_ignored() {
    // Arrange: the fake answers with a source id the client never used.
    let handler: common::Handler = respond_with(|request| {
        vec![Outgoing::ReplyWithSource {
            message_type: MessageType::DeviceStateService,
            payload: state_service(56700),
            source: request.header.source.wrapping_add(1).max(1),
        }]
    });
    let device = FakeDevice::spawn(test_mac(5), handler).await;
    let (client, mut events) =
        LifxClient::new(loopback_config(device.addr.port(), 500)).expect("client");

    // Act
    client.start_discovery();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Assert
    assert!(!device.received().is_empty());
    assert!(next_event(&mut events, Duration::from_millis(50)).await.is_none());
    assert!(client.devices().is_empty());
}

#[tokio::test]
async fn test_classification_can_be_disabled() {
    // Arrange
    let device = spawn_bulb(6, 32).await;
    let mut config = loopback_config(device.addr.port(), 500);
    config.discovery.classify_devices = false;
    let (client, mut events) = LifxClient::new(config).expect("client");

    // Act
    client.start_discovery();
    let found = expect_discovered(&mut events).await;

    // Assert
    assert_eq!(found.class, DeviceClass::Light);
    assert_eq!(found.product_id, None);
    assert!(device.received_of(MessageType::DeviceGetVersion).is_empty());
}
