//! Connection lifecycle and multi-connection orchestration.
//!
//! The heart of oscrelay: per-connection socket state machines
//! ([`ConnectionRuntime`]) and the eight-slot registry that manages
//! them ([`ConnectionRegistry`]).

mod config;
mod event;
mod heartbeat;
mod liveness;
mod registry;
mod runtime;

pub use config::{
    parse_port, parse_text, ConnectionConfig, HeartbeatConfig, OscArg, ProxyTarget,
    DEFAULT_ADDRESS_IN, DEFAULT_ADDRESS_OUT,
};
pub use event::{ConnectionEvent, MessageEvent};
pub use heartbeat::Heartbeat;
pub use liveness::{FrequencyReport, LivenessTracker, SAMPLE_WINDOW, SILENCE_CEILING_MS};
pub use registry::{ConnectionRegistry, SettingsSink};
pub use runtime::ConnectionRuntime;
