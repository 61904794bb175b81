//! Connection registry: eight fixed slots, reconciled as a unit.
//!
//! The registry owns every runtime. Reconfiguring a slot always tears
//! the old runtime down (ports released, timers cancelled) before the
//! replacement binds, so a rebind of the same port cannot race the old
//! socket. Failures stay inside their slot: one bad config never
//! disturbs the other seven.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::codec::OscPacket;
use crate::connection::config::ConnectionConfig;
use crate::connection::event::{ConnectionEvent, EVENT_CHANNEL_CAPACITY};
use crate::connection::runtime::ConnectionRuntime;
use crate::types::SlotId;
use crate::MAX_CONNECTIONS;

/// Hook back into the settings collaborator: when a slot fails to
/// activate, its stored config is flipped to inactive so the failure
/// does not repeat on every reload.
pub trait SettingsSink: Send + Sync {
    fn mark_inactive(&self, slot: SlotId);
}

/// Holder of the eight connection slots.
///
/// Slots are 1-indexed to match how front-ends number them; the slot
/// table keeps index 0 permanently empty.
pub struct ConnectionRegistry {
    slots: Vec<Option<ConnectionRuntime>>,
    events: broadcast::Sender<ConnectionEvent>,
    settings: Option<Arc<dyn SettingsSink>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            slots: (0..=MAX_CONNECTIONS).map(|_| None).collect(),
            events,
            settings: None,
        }
    }

    /// Attach the settings collaborator used to mark failed slots
    /// inactive.
    pub fn with_settings(mut self, settings: Arc<dyn SettingsSink>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Subscribe to the merged event stream of all connections.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Apply `config` to `slot`, tearing down whatever ran there
    /// before. Returns `true` when the slot ends up in its desired
    /// state (including "inactive, empty"); `false` when activation
    /// failed. Never panics, never disturbs other slots.
    pub async fn reconcile(&mut self, slot: SlotId, config: &ConnectionConfig) -> bool {
        // Close-then-init: the old runtime must fully release its
        // ports before the replacement tries to bind them.
        if let Some(mut existing) = self.slots[slot.index()].take() {
            existing.safe_close().await;
        }

        if !config.active {
            return true;
        }

        match ConnectionRuntime::init(slot, config, self.events.clone()).await {
            Ok(runtime) => {
                info!(%slot, name = runtime.name(), "connection open");
                self.slots[slot.index()] = Some(runtime);
                true
            }
            Err(err) => {
                warn!(%slot, "connection failed to open: {err}");
                if let Some(settings) = &self.settings {
                    settings.mark_inactive(slot);
                }
                false
            }
        }
    }

    /// Reconcile every slot in order 1..=8 against `configs` (slot N
    /// takes `configs[N-1]`; missing entries deactivate the slot).
    /// Returns `true` only if every slot succeeded, but a failure on
    /// one slot never stops the rest from being attempted.
    pub async fn reconcile_all(&mut self, configs: &[ConnectionConfig]) -> bool {
        let inactive = ConnectionConfig::default();

        let mut all_ok = true;
        for slot in SlotId::all() {
            let config = configs.get(slot.index() - 1).unwrap_or(&inactive);
            all_ok &= self.reconcile(slot, config).await;
        }
        all_ok
    }

    /// Send a packet out a slot's connection. Returns `false` (never
    /// an error) if the slot is empty or the send fails.
    pub async fn send(&self, slot: SlotId, packet: &OscPacket) -> bool {
        let Some(runtime) = &self.slots[slot.index()] else {
            return false;
        };

        match runtime.send_object_out(packet).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%slot, "send failed: {err}");
                let _ = self.events.send(ConnectionEvent::Error {
                    slot,
                    name: Arc::from(runtime.name()),
                    detail: err.to_string(),
                });
                false
            }
        }
    }

    /// The runtime occupying `slot`, if any.
    pub fn runtime(&self, slot: SlotId) -> Option<&ConnectionRuntime> {
        self.slots[slot.index()].as_ref()
    }

    /// Slots currently holding an open connection, in order.
    pub fn active_slots(&self) -> Vec<SlotId> {
        SlotId::all()
            .filter(|slot| self.slots[slot.index()].is_some())
            .collect()
    }

    /// Tear down every connection. Called on process shutdown.
    pub async fn shutdown(&mut self) {
        for slot in SlotId::all() {
            if let Some(mut runtime) = self.slots[slot.index()].take() {
                runtime.safe_close().await;
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
