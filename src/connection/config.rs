//! Per-connection configuration.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rosc::OscType;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::MAX_PROXY_TARGETS;

/// Default bind address for the inbound socket.
pub const DEFAULT_ADDRESS_IN: &str = "0.0.0.0";
/// Default destination address for the outbound socket.
pub const DEFAULT_ADDRESS_OUT: &str = "127.0.0.1";

/// Immutable description of one connection's desired behavior.
///
/// A connection can listen (`port_in`), relay (`port_out`), fan
/// inbound traffic out to up to three proxy targets, reflect a
/// secondary listener back out the main output (`proxy_in`), and emit
/// a periodic heartbeat. All of it is optional; a config with neither
/// port set is rejected when the connection is activated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Display label.
    pub name: Option<String>,

    /// Whether the slot should be opened at all.
    pub active: bool,

    /// Port to listen on. `None` disables the inbound side.
    pub port_in: Option<u16>,

    /// Port to relay to. `None` disables the outbound side.
    pub port_out: Option<u16>,

    /// Bind address for the inbound socket (default `0.0.0.0`).
    pub address_in: Option<String>,

    /// Destination address for outbound sends (default `127.0.0.1`).
    pub address_out: Option<String>,

    /// Reuse the inbound socket as the outbound socket.
    pub shared_socket: bool,

    /// Fan-out targets that receive a verbatim copy of inbound
    /// traffic, in list order. Only honored when `port_in` is set.
    pub proxy_pairs: Vec<ProxyTarget>,

    /// Secondary listener whose traffic is reflected to `port_out`.
    pub proxy_in: Option<ProxyTarget>,

    /// Periodic liveness message sent out `port_out`.
    pub heartbeat: Option<HeartbeatConfig>,
}

/// A fan-out destination or a secondary-listener bind point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyTarget {
    pub address: String,
    pub port: u16,
}

impl ProxyTarget {
    /// Resolve to a socket address.
    pub fn sock_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .address
            .parse()
            .map_err(|_| Error::Config(format!("invalid proxy address: {}", self.address)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Heartbeat configuration: the message is pre-built once and re-sent
/// on every tick of the interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// OSC address pattern of the heartbeat message.
    pub address: String,

    /// Arguments carried by the heartbeat message.
    #[serde(default)]
    pub args: Vec<OscArg>,

    /// Send period.
    #[serde(with = "humantime_serde")]
    pub every: Duration,
}

/// A typed OSC argument as written in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum OscArg {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bool(bool),
}

impl From<&OscArg> for OscType {
    fn from(arg: &OscArg) -> Self {
        match arg {
            OscArg::Int(v) => OscType::Int(*v),
            OscArg::Long(v) => OscType::Long(*v),
            OscArg::Float(v) => OscType::Float(*v),
            OscArg::Double(v) => OscType::Double(*v),
            OscArg::String(v) => OscType::String(v.clone()),
            OscArg::Bool(v) => OscType::Bool(*v),
        }
    }
}

impl ConnectionConfig {
    /// Display label, with the fallback used for unnamed slots.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("un-named")
    }

    /// Bind address for the inbound socket.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let port = self
            .port_in
            .ok_or_else(|| Error::Config("no inbound port".into()))?;
        let ip = parse_ip(self.address_in.as_deref().unwrap_or(DEFAULT_ADDRESS_IN))?;
        Ok(SocketAddr::new(ip, port))
    }

    /// Destination address for outbound sends.
    pub fn out_addr(&self) -> Result<SocketAddr> {
        let port = self
            .port_out
            .ok_or_else(|| Error::Config("no outbound port".into()))?;
        let ip = parse_ip(self.address_out.as_deref().unwrap_or(DEFAULT_ADDRESS_OUT))?;
        Ok(SocketAddr::new(ip, port))
    }

    /// Whether inbound traffic is fanned out to proxy targets.
    pub fn fan_out_active(&self) -> bool {
        self.port_in.is_some() && !self.proxy_pairs.is_empty()
    }

    /// Whether the secondary listener is reflected to the output.
    pub fn proxy_in_active(&self) -> bool {
        self.proxy_in.is_some() && self.port_out.is_some()
    }

    /// Whether a heartbeat will be sent.
    pub fn heartbeat_active(&self) -> bool {
        self.heartbeat.is_some() && self.port_out.is_some()
    }

    /// Validate the config for activation.
    ///
    /// Failures here are fatal to this connection only: the connection
    /// never opens and no socket is created.
    pub fn validate(&self) -> Result<()> {
        if self.port_in.is_none() && self.port_out.is_none() {
            return Err(Error::Config("connection does nothing".into()));
        }

        if self.shared_socket {
            let out_ip = self
                .address_out
                .as_deref()
                .map(parse_ip)
                .transpose()?
                .unwrap_or_else(|| DEFAULT_ADDRESS_OUT.parse().unwrap());

            if self.port_in.is_none() || self.port_out.is_none() || out_ip.is_loopback() {
                return Err(Error::Config("invalid shared socket configuration".into()));
            }
        }

        if self.port_in.is_some() {
            self.bind_addr()?;
        }
        if self.port_out.is_some() {
            self.out_addr()?;
        }

        if self.proxy_pairs.len() > MAX_PROXY_TARGETS {
            return Err(Error::Config(format!(
                "at most {MAX_PROXY_TARGETS} proxy targets per connection"
            )));
        }
        for target in &self.proxy_pairs {
            target.sock_addr()?;
        }
        if let Some(proxy_in) = &self.proxy_in {
            proxy_in.sock_addr()?;
        }

        Ok(())
    }
}

fn parse_ip(text: &str) -> Result<IpAddr> {
    text.parse()
        .map_err(|_| Error::Config(format!("invalid address: {text}")))
}

/// Parse a numeric form field: blank or unparseable text becomes
/// `None`, never a junk value.
pub fn parse_port(text: &str) -> Option<u16> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse().ok()
}

/// Parse a text form field: blank becomes `None`.
pub fn parse_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
