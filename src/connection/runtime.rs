//! Per-connection socket state machine.
//!
//! A runtime owns up to four UDP sockets (inbound, outbound, fan-out,
//! proxy-in), a liveness window and an optional heartbeat, plus the
//! tokio tasks that service them. All sockets are bound before any
//! task is spawned, so a failed init can never leak a timer. Teardown
//! is explicit: [`ConnectionRuntime::safe_close`] stops every task and
//! releases every port before returning.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::codec;
use crate::connection::config::ConnectionConfig;
use crate::connection::event::{ConnectionEvent, EventSink};
use crate::connection::heartbeat::Heartbeat;
use crate::connection::liveness::LivenessTracker;
use crate::error::{Error, Result, TransportError};
use crate::net::{self, SocketConfig};
use crate::types::{RuntimeState, SlotId};

const RECV_BUFFER_LEN: usize = 64 * 1024;

/// Interval between liveness samples.
const LIVENESS_PERIOD: Duration = Duration::from_secs(1);

/// Outbound half of a connection: the socket plus its fixed target.
#[derive(Clone)]
struct Outbound {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    sink: EventSink,
}

impl Outbound {
    /// Write `bytes` to the target, then report the send as an
    /// outbound message event decoded from the same bytes.
    async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.socket
            .send_to(bytes, self.target)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        match codec::decode(bytes) {
            Ok(packet) => self.sink.packet(Some(packet), false, true),
            Err(err) => self.sink.error(err),
        }
        Ok(())
    }
}

/// Fan-out half: verbatim copies of inbound traffic to each target.
struct FanOut {
    socket: Arc<UdpSocket>,
    targets: Vec<SocketAddr>,
}

/// One live connection.
pub struct ConnectionRuntime {
    slot: SlotId,
    name: Arc<str>,
    state: RuntimeState,
    in_socket: Option<Arc<UdpSocket>>,
    out: Option<Outbound>,
    proxy_socket: Option<Arc<UdpSocket>>,
    in_proxy_socket: Option<Arc<UdpSocket>>,
    sink: EventSink,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl ConnectionRuntime {
    /// Open a connection described by `config`.
    ///
    /// Validation failures and bind failures are both fatal to this
    /// connection only: every socket bound so far is released, an
    /// error event is published, and the error is returned so the
    /// registry can mark the slot inactive. No task or timer survives
    /// a failed init.
    pub async fn init(
        slot: SlotId,
        config: &ConnectionConfig,
        events: broadcast::Sender<ConnectionEvent>,
    ) -> Result<Self> {
        let name: Arc<str> = Arc::from(config.display_name());
        let sink = EventSink::new(slot, Arc::clone(&name), events);

        let report = |err: Error| {
            sink.error(&err);
            err
        };

        config.validate().map_err(report)?;

        let socket_config = SocketConfig::default();

        // Bind phase. Sockets opened here are plain values until the
        // struct is assembled, so an early return drops (and closes)
        // all of them.
        let in_socket = match config.port_in {
            Some(_) => {
                let addr = config.bind_addr()?;
                let socket = net::bind_udp(addr, &socket_config).map_err(report)?;
                debug!(%slot, %addr, "inbound socket bound");
                Some(Arc::new(socket))
            }
            None => None,
        };

        let out_socket = match config.port_out {
            Some(_) => {
                if config.shared_socket {
                    // Validation guarantees the inbound socket exists.
                    in_socket.clone()
                } else {
                    let socket = net::bind_udp_ephemeral(&socket_config).map_err(report)?;
                    Some(Arc::new(socket))
                }
            }
            None => None,
        };

        let out = match out_socket {
            Some(socket) => Some(Outbound {
                socket,
                target: config.out_addr()?,
                sink: sink.clone(),
            }),
            None => None,
        };

        let fan_out = if config.fan_out_active() {
            let mut targets = Vec::with_capacity(config.proxy_pairs.len());
            for pair in &config.proxy_pairs {
                targets.push(pair.sock_addr()?);
            }
            let socket = net::bind_udp_ephemeral(&socket_config).map_err(report)?;
            Some(FanOut {
                socket: Arc::new(socket),
                targets,
            })
        } else {
            None
        };

        let in_proxy_socket = if config.proxy_in_active() {
            let target = config
                .proxy_in
                .as_ref()
                .expect("proxy_in_active checked")
                .sock_addr()?;
            let socket = net::bind_udp(target, &socket_config).map_err(report)?;
            debug!(%slot, %target, "proxy-in socket bound");
            Some(Arc::new(socket))
        } else {
            None
        };

        // Task phase. Nothing above spawned; from here on every task
        // listens on the shutdown channel.
        let (shutdown, _) = broadcast::channel(1);
        let mut tasks = Vec::new();
        let liveness = Arc::new(Mutex::new(LivenessTracker::new()));

        let proxy_socket = fan_out.as_ref().map(|f| Arc::clone(&f.socket));

        if let Some(socket) = &in_socket {
            sink.packet(None, false, false);

            tasks.push(spawn_receiver(
                Arc::clone(socket),
                fan_out,
                Arc::clone(&liveness),
                sink.clone(),
                shutdown.subscribe(),
            ));
            tasks.push(spawn_sampler(
                Arc::clone(&liveness),
                sink.clone(),
                shutdown.subscribe(),
            ));
        }

        if let (Some(out), Some(socket)) = (&out, &in_proxy_socket) {
            sink.packet(None, true, false);

            tasks.push(spawn_reflector(
                Arc::clone(socket),
                out.clone(),
                Arc::clone(&liveness),
                sink.clone(),
                shutdown.subscribe(),
            ));
        }

        if config.heartbeat_active() {
            let heartbeat = Heartbeat::prepare(
                config.heartbeat.as_ref().expect("heartbeat_active checked"),
            )
            .map_err(report)?;
            let out = out.clone().expect("heartbeat requires an outbound socket");

            tasks.push(spawn_heartbeat(heartbeat, out, shutdown.subscribe()));
        }

        Ok(Self {
            slot,
            name,
            state: RuntimeState::Open,
            in_socket,
            out,
            proxy_socket,
            in_proxy_socket,
            sink,
            shutdown,
            tasks,
        })
    }

    /// The slot this runtime occupies.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Display label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Local address of the inbound socket, if one is bound.
    pub fn local_in_addr(&self) -> Option<SocketAddr> {
        self.in_socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Local address of the proxy-in socket, if one is bound.
    pub fn local_proxy_in_addr(&self) -> Option<SocketAddr> {
        self.in_proxy_socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
    }

    /// Write raw bytes out the outbound socket and report the send.
    pub async fn send_out(&self, bytes: &[u8]) -> Result<()> {
        let out = self.out.as_ref().ok_or_else(|| {
            Error::from(TransportError::SendFailed("no outbound socket".into()))
        })?;
        out.send(bytes).await
    }

    /// Encode a packet and send it via [`Self::send_out`].
    pub async fn send_object_out(&self, packet: &codec::OscPacket) -> Result<()> {
        let bytes = codec::encode(packet)?;
        self.send_out(&bytes).await
    }

    /// Stop all tasks and release all sockets. Idempotent; a second
    /// call is a no-op. After this returns, every port held by the
    /// runtime is free to rebind.
    pub async fn safe_close(&mut self) {
        if self.state == RuntimeState::Closed {
            return;
        }
        self.state = RuntimeState::Closed;

        let _ = self.shutdown.send(());
        for task in self.tasks.drain(..) {
            task.abort();
            // Wait for the task to actually finish so the socket Arcs
            // it holds are dropped before we report the ports free.
            let _ = task.await;
        }

        self.in_proxy_socket = None;
        self.in_socket = None;
        self.out = None;
        self.proxy_socket = None;

        self.sink.log("connection closed");
        debug!(slot = %self.slot, name = %self.name, "connection closed");
    }
}

// Last-resort cleanup if a runtime is dropped without safe_close;
// aborted tasks release their sockets once the scheduler runs them.
impl Drop for ConnectionRuntime {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ConnectionRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRuntime")
            .field("slot", &self.slot)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("in", &self.local_in_addr())
            .field(
                "fan_out",
                &self.proxy_socket.as_ref().and_then(|s| s.local_addr().ok()),
            )
            .field("proxy_in", &self.local_proxy_in_addr())
            .finish()
    }
}

/// Primary receive loop: fan inbound datagrams out to the proxy
/// targets, then decode and report. Decode failures are reported and
/// listening continues; a socket error ends the loop.
fn spawn_receiver(
    socket: Arc<UdpSocket>,
    fan_out: Option<FanOut>,
    liveness: Arc<Mutex<LivenessTracker>>,
    sink: EventSink,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                result = socket.recv_from(&mut buf) => match result {
                    Ok((len, _from)) => {
                        let datagram = &buf[..len];

                        if let Some(fan_out) = &fan_out {
                            // Best effort, in list order; one dead
                            // target must not starve the others.
                            for target in &fan_out.targets {
                                if let Err(e) = fan_out.socket.send_to(datagram, *target).await {
                                    sink.error(format!("proxy send to {target} failed: {e}"));
                                }
                            }
                        }

                        match codec::decode(datagram) {
                            Ok(packet) => {
                                liveness.lock().record(Instant::now());
                                sink.packet(Some(packet), false, false);
                            }
                            Err(err) => sink.error(err),
                        }
                    }
                    Err(e) => {
                        sink.error(format!("receive failed: {e}"));
                        break;
                    }
                }
            }
        }
    })
}

/// 1 Hz liveness sampler; publishes a frequency event every tick
/// whether or not traffic arrived.
fn spawn_sampler(
    liveness: Arc<Mutex<LivenessTracker>>,
    sink: EventSink,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + LIVENESS_PERIOD;
        let mut ticker = tokio::time::interval_at(start, LIVENESS_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let report = liveness.lock().report(Instant::now());
                    sink.frequency(report);
                }
            }
        }
    })
}

/// Proxy-in loop: everything received on the secondary listener is
/// reflected out the main output and reported as inbound traffic
/// tagged as proxy-in. An error here closes only this socket.
fn spawn_reflector(
    socket: Arc<UdpSocket>,
    out: Outbound,
    liveness: Arc<Mutex<LivenessTracker>>,
    sink: EventSink,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                result = socket.recv_from(&mut buf) => match result {
                    Ok((len, _from)) => {
                        let datagram = &buf[..len];

                        if let Err(e) = out.send(datagram).await {
                            sink.error(e);
                        }

                        match codec::decode(datagram) {
                            Ok(packet) => {
                                liveness.lock().record(Instant::now());
                                sink.packet(Some(packet), true, false);
                            }
                            Err(err) => sink.error(err),
                        }
                    }
                    Err(e) => {
                        sink.error(format!("proxy-in receive failed: {e}"));
                        break;
                    }
                }
            }
        }
    })
}

/// Fixed-period heartbeat; re-sends the pre-built payload forever.
fn spawn_heartbeat(
    heartbeat: Heartbeat,
    out: Outbound,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = heartbeat.every();
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    if let Err(e) = out.send(heartbeat.payload()).await {
                        out.sink.error(e);
                    }
                }
            }
        }
    })
}
