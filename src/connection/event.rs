//! Typed event stream emitted by connection runtimes.
//!
//! Runtimes publish onto a shared broadcast channel owned by the
//! registry; shells subscribe and render. The event set is fixed:
//! message, frequency, error, log.

use std::sync::Arc;
use std::time::SystemTime;

use rosc::OscPacket;
use tokio::sync::broadcast;

use crate::connection::liveness::FrequencyReport;
use crate::types::SlotId;

/// Broadcast capacity for the registry event channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// An event emitted by one connection.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Traffic observed on the connection, or a listening marker.
    Message(MessageEvent),

    /// Periodic liveness sample (1 Hz, independent of traffic).
    Frequency {
        slot: SlotId,
        name: Arc<str>,
        report: FrequencyReport,
    },

    /// A contained failure on this connection.
    Error {
        slot: SlotId,
        name: Arc<str>,
        detail: String,
    },

    /// Informational note for user-visible reporting.
    Log {
        slot: SlotId,
        name: Arc<str>,
        detail: String,
    },
}

/// One observed packet, or the synthetic open marker.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub slot: SlotId,
    pub name: Arc<str>,
    /// Wall-clock receive/send time.
    pub at: SystemTime,
    /// True when the packet arrived on the secondary (proxy-in) listener.
    pub proxy_in: bool,
    /// True when the packet left via the outbound socket.
    pub send_out: bool,
    /// Decoded packet. `None` marks "socket is listening" so shells can
    /// distinguish an open connection from one that has seen traffic.
    pub packet: Option<OscPacket>,
}

impl MessageEvent {
    /// Whether this is the synthetic open marker rather than traffic.
    pub fn is_open_marker(&self) -> bool {
        self.packet.is_none()
    }
}

/// Cheap per-runtime handle for publishing events.
#[derive(Clone)]
pub(crate) struct EventSink {
    slot: SlotId,
    name: Arc<str>,
    tx: broadcast::Sender<ConnectionEvent>,
}

impl EventSink {
    pub(crate) fn new(slot: SlotId, name: Arc<str>, tx: broadcast::Sender<ConnectionEvent>) -> Self {
        Self { slot, name, tx }
    }

    pub(crate) fn packet(&self, packet: Option<OscPacket>, proxy_in: bool, send_out: bool) {
        let _ = self.tx.send(ConnectionEvent::Message(MessageEvent {
            slot: self.slot,
            name: Arc::clone(&self.name),
            at: SystemTime::now(),
            proxy_in,
            send_out,
            packet,
        }));
    }

    pub(crate) fn frequency(&self, report: FrequencyReport) {
        let _ = self.tx.send(ConnectionEvent::Frequency {
            slot: self.slot,
            name: Arc::clone(&self.name),
            report,
        });
    }

    pub(crate) fn error(&self, detail: impl ToString) {
        let _ = self.tx.send(ConnectionEvent::Error {
            slot: self.slot,
            name: Arc::clone(&self.name),
            detail: detail.to_string(),
        });
    }

    pub(crate) fn log(&self, detail: impl ToString) {
        let _ = self.tx.send(ConnectionEvent::Log {
            slot: self.slot,
            name: Arc::clone(&self.name),
            detail: detail.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_survives_no_subscribers() {
        let (tx, _) = broadcast::channel(8);
        let sink = EventSink::new(SlotId::new(1).unwrap(), Arc::from("test"), tx);

        // The initial receiver is dropped; publishing must not panic.
        sink.packet(None, false, false);
        sink.error("nobody listening");
        sink.log("still fine");
    }

    #[test]
    fn test_open_marker() {
        let (tx, mut rx) = broadcast::channel(8);
        let sink = EventSink::new(SlotId::new(2).unwrap(), Arc::from("desk"), tx);

        sink.packet(None, true, false);

        match rx.try_recv().unwrap() {
            ConnectionEvent::Message(msg) => {
                assert!(msg.is_open_marker());
                assert!(msg.proxy_in);
                assert!(!msg.send_out);
                assert_eq!(&*msg.name, "desk");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
