//! # oscrelay
//!
//! Observe and reroute OSC (Open Sound Control) traffic carried over UDP.
//!
//! Up to eight independently configured connections run concurrently.
//! Each connection can listen on a port and report incoming packets,
//! relay outbound packets to a destination, fan a received stream out
//! to several proxy targets, reflect traffic received on a secondary
//! "proxy-in" port back out the main output, and emit a periodic
//! heartbeat message.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Shell (CLI / embedder)                │
//! ├─────────────────────────────────────────────────────────┤
//! │                   ConnectionRegistry                    │
//! │  ┌────────┐ ┌────────┐ ┌────────┐        ┌────────┐     │
//! │  │ Slot 1 │ │ Slot 2 │ │ Slot 3 │  ...   │ Slot 8 │     │
//! │  └────────┘ └────────┘ └────────┘        └────────┘     │
//! ├─────────────────────────────────────────────────────────┤
//! │   ConnectionRuntime (per slot): in / out / fan-out /    │
//! │   proxy-in sockets, liveness sampler, heartbeat         │
//! ├─────────────────────────────────────────────────────────┤
//! │                OSC codec (rosc) over UDP                │
//! └─────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]                 // ASCII diagrams in docs
#![allow(clippy::cast_possible_truncation)]     // Millisecond conversions
#![allow(clippy::cast_precision_loss)]          // Acceptable for rate math
#![allow(clippy::struct_excessive_bools)]       // Boolean config fields are appropriate
#![allow(clippy::future_not_send)]              // Async internals

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod net;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of connection slots managed by the registry.
pub const MAX_CONNECTIONS: usize = 8;

/// Maximum fan-out targets per connection.
pub const MAX_PROXY_TARGETS: usize = 3;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{OscMessage, OscPacket, OscType};
    pub use crate::config::{Settings, SharedSettings};
    pub use crate::connection::{
        ConnectionConfig, ConnectionEvent, ConnectionRegistry, ConnectionRuntime, FrequencyReport,
        HeartbeatConfig, MessageEvent, ProxyTarget,
    };
    pub use crate::error::{Error, Result};
    pub use crate::types::{RuntimeState, SlotId};
}
