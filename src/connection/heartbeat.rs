//! Periodic heartbeat message.

use std::time::Duration;

use rosc::OscType;

use crate::codec;
use crate::connection::config::HeartbeatConfig;
use crate::error::Result;

/// A heartbeat is a fixed message pre-encoded once at connection init
/// and re-sent verbatim on every tick.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    payload: Vec<u8>,
    every: Duration,
}

impl Heartbeat {
    /// Encode the configured message. Runs once; a config whose args
    /// cannot be encoded fails the connection before any timer starts.
    pub fn prepare(config: &HeartbeatConfig) -> Result<Self> {
        let args: Vec<OscType> = config.args.iter().map(OscType::from).collect();
        let payload = codec::encode(&codec::message(config.address.clone(), args))?;

        Ok(Self {
            payload,
            every: config.every,
        })
    }

    /// The pre-built wire bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Send period.
    pub fn every(&self) -> Duration {
        self.every
    }
}
