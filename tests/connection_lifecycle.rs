//! Connection runtime lifecycle: validation, bind, teardown, rebind.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use oscrelay::codec::{self, OscPacket, OscType};
use oscrelay::connection::{ConnectionConfig, ConnectionEvent, ConnectionRuntime};
use oscrelay::error::{Error, TransportError};
use oscrelay::types::{RuntimeState, SlotId};

fn slot(n: u8) -> SlotId {
    SlotId::new(n).unwrap()
}

fn events() -> (
    broadcast::Sender<ConnectionEvent>,
    broadcast::Receiver<ConnectionEvent>,
) {
    broadcast::channel(256)
}

async fn next_event(rx: &mut broadcast::Receiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Wait for the next message event, skipping frequency samples.
async fn next_message(
    rx: &mut broadcast::Receiver<ConnectionEvent>,
) -> oscrelay::connection::MessageEvent {
    loop {
        match next_event(rx).await {
            ConnectionEvent::Message(msg) => return msg,
            ConnectionEvent::Frequency { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

fn loopback_listener() -> ConnectionConfig {
    ConnectionConfig {
        active: true,
        port_in: Some(0),
        address_in: Some("127.0.0.1".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn inert_config_is_rejected_without_sockets() {
    let (tx, _rx) = events();
    let config = ConnectionConfig {
        active: true,
        ..Default::default()
    };

    let err = ConnectionRuntime::init(slot(1), &config, tx)
        .await
        .unwrap_err();

    assert!(err.is_config());
    assert!(err.to_string().contains("connection does nothing"));
}

#[tokio::test]
async fn shared_socket_to_loopback_is_rejected() {
    let (tx, _rx) = events();
    let config = ConnectionConfig {
        active: true,
        shared_socket: true,
        port_in: Some(0),
        port_out: Some(9001),
        address_out: Some("127.0.0.1".into()),
        ..Default::default()
    };

    let err = ConnectionRuntime::init(slot(1), &config, tx)
        .await
        .unwrap_err();

    assert!(err.is_config());
    assert!(err.to_string().contains("invalid shared socket"));
}

#[tokio::test]
async fn bind_failure_is_reported_and_contained() {
    let (tx, mut rx) = events();

    // TEST-NET-1 is never locally assigned, so the bind fails.
    let config = ConnectionConfig {
        active: true,
        port_in: Some(9000),
        address_in: Some("192.0.2.1".into()),
        ..Default::default()
    };

    let err = ConnectionRuntime::init(slot(2), &config, tx)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::BindFailed { .. })
    ));

    // The failure surfaced on the event stream too.
    match next_event(&mut rx).await {
        ConnectionEvent::Error { detail, .. } => assert!(detail.contains("bind failed")),
        other => panic!("expected an error event, got {other:?}"),
    }
}

#[tokio::test]
async fn open_marker_precedes_traffic() {
    let (tx, mut rx) = events();
    let mut runtime = ConnectionRuntime::init(slot(1), &loopback_listener(), tx)
        .await
        .unwrap();

    let msg = next_message(&mut rx).await;
    assert!(msg.is_open_marker());
    assert!(!msg.proxy_in);
    assert!(!msg.send_out);

    runtime.safe_close().await;
}

#[tokio::test]
async fn close_then_reopen_same_port_succeeds() {
    let (tx, _rx) = events();

    let mut first = ConnectionRuntime::init(slot(1), &loopback_listener(), tx.clone())
        .await
        .unwrap();
    let addr = first.local_in_addr().unwrap();
    assert_eq!(first.state(), RuntimeState::Open);

    first.safe_close().await;
    assert_eq!(first.state(), RuntimeState::Closed);

    // Rebinding the exact same port must succeed: nothing leaked.
    let config = ConnectionConfig {
        active: true,
        port_in: Some(addr.port()),
        address_in: Some("127.0.0.1".into()),
        ..Default::default()
    };
    let mut second = ConnectionRuntime::init(slot(1), &config, tx).await.unwrap();
    assert_eq!(second.local_in_addr().unwrap(), addr);

    second.safe_close().await;
}

#[tokio::test]
async fn double_close_is_a_noop() {
    let (tx, _rx) = events();
    let mut runtime = ConnectionRuntime::init(slot(1), &loopback_listener(), tx)
        .await
        .unwrap();

    runtime.safe_close().await;
    runtime.safe_close().await;
    assert_eq!(runtime.state(), RuntimeState::Closed);
}

#[tokio::test]
async fn decode_failure_keeps_listening() {
    let (tx, mut rx) = events();
    let mut runtime = ConnectionRuntime::init(slot(1), &loopback_listener(), tx)
        .await
        .unwrap();
    let addr = runtime.local_in_addr().unwrap();

    // Drain the open marker.
    let _ = next_message(&mut rx).await;

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // Garbage first: reported as an error, socket stays open.
    sender.send_to(&[0xde, 0xad, 0xbe, 0xef], addr).await.unwrap();
    loop {
        match next_event(&mut rx).await {
            ConnectionEvent::Error { .. } => break,
            ConnectionEvent::Frequency { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // A well-formed packet afterwards is still decoded and reported.
    let packet = codec::message("/alive", vec![OscType::Int(1)]);
    sender
        .send_to(&codec::encode(&packet).unwrap(), addr)
        .await
        .unwrap();

    let msg = next_message(&mut rx).await;
    match msg.packet {
        Some(OscPacket::Message(m)) => assert_eq!(m.addr, "/alive"),
        other => panic!("expected a decoded message, got {other:?}"),
    }

    runtime.safe_close().await;
}

#[tokio::test]
async fn liveness_samples_flow_without_traffic() {
    let (tx, mut rx) = events();
    let mut runtime = ConnectionRuntime::init(slot(1), &loopback_listener(), tx)
        .await
        .unwrap();

    // A frequency sample arrives within the first ~1s tick even though
    // no packet was ever received.
    let report = loop {
        match next_event(&mut rx).await {
            ConnectionEvent::Frequency { report, .. } => break report,
            ConnectionEvent::Message(_) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    };

    assert_eq!(report.rate, 0.0);
    assert_eq!(report.silence_ms, oscrelay::connection::SILENCE_CEILING_MS);
    assert!(!report.ever_worked);

    runtime.safe_close().await;
}

#[tokio::test]
async fn heartbeat_resends_prebuilt_message() {
    let (tx, mut rx) = events();

    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = receiver.local_addr().unwrap();

    let config = ConnectionConfig {
        active: true,
        port_out: Some(target.port()),
        address_out: Some("127.0.0.1".into()),
        heartbeat: Some(oscrelay::connection::HeartbeatConfig {
            address: "/hello".into(),
            args: vec![oscrelay::connection::OscArg::String("world".into())],
            every: Duration::from_secs(1),
        }),
        ..Default::default()
    };

    let mut runtime = ConnectionRuntime::init(slot(4), &config, tx).await.unwrap();

    let mut buf = [0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(3), receiver.recv_from(&mut buf))
        .await
        .expect("no heartbeat within 3s")
        .unwrap();

    match codec::decode(&buf[..len]).unwrap() {
        OscPacket::Message(m) => {
            assert_eq!(m.addr, "/hello");
            assert_eq!(m.args[0], OscType::String("world".into()));
        }
        other => panic!("expected heartbeat message, got {other:?}"),
    }

    // Each heartbeat is also reported as an outbound message event.
    let msg = next_message(&mut rx).await;
    assert!(msg.send_out);
    assert!(!msg.proxy_in);

    runtime.safe_close().await;
}
