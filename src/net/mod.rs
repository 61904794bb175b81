//! Low-level UDP socket creation.
//!
//! Sockets are created through `socket2` so `SO_REUSEADDR` can be set
//! before bind, then handed to tokio for async IO.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::{Result, TransportError};

/// Socket configuration options.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub send_buffer_size: usize,
    pub recv_buffer_size: usize,
    pub reuse_addr: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: 256 * 1024,
            recv_buffer_size: 256 * 1024,
            reuse_addr: true,
        }
    }
}

/// Create a UDP socket bound to `addr` and register it with the tokio
/// reactor. Must be called from within a tokio runtime.
pub fn bind_udp(addr: SocketAddr, config: &SocketConfig) -> Result<UdpSocket> {
    let socket = create_udp_socket(addr, config)?;

    UdpSocket::from_std(socket.into()).map_err(|e| {
        TransportError::BindFailed {
            addr,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Create a UDP socket bound to an ephemeral IPv4 port.
pub fn bind_udp_ephemeral(config: &SocketConfig) -> Result<UdpSocket> {
    bind_udp(SocketAddr::from(([0u8; 4], 0)), config)
}

/// Create and configure a bound `socket2` UDP socket.
fn create_udp_socket(addr: SocketAddr, config: &SocketConfig) -> Result<Socket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    socket
        .set_send_buffer_size(config.send_buffer_size)
        .map_err(|e| TransportError::SocketError(format!("set send buffer: {e}")))?;

    socket
        .set_recv_buffer_size(config.recv_buffer_size)
        .map_err(|e| TransportError::SocketError(format!("set recv buffer: {e}")))?;

    if config.reuse_addr {
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::SocketError(format!("set reuse addr: {e}")))?;
    }

    // For IPv6, allow IPv4 mapped addresses
    if addr.is_ipv6() {
        socket
            .set_only_v6(false)
            .map_err(|e| TransportError::SocketError(e.to_string()))?;
    }

    socket.bind(&addr.into()).map_err(|e| TransportError::BindFailed {
        addr,
        reason: e.to_string(),
    })?;

    socket
        .set_nonblocking(true)
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    Ok(socket)
}
