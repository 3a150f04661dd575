//! The multicast transport layer (L2): a socket wrapper and the
//! cancellable receive loop above it.
//!
//! Grounded on the teacher's `clients::UdpClient` (bind, set a read
//! timeout, exchange) for the blocking-with-deadline socket style, and on
//! `socket2::Socket` (brought in specifically for `join_multicast_v4` and
//! `set_multicast_loop_v4`, which `std::net::UdpSocket` doesn't expose) for
//! the group-membership setup the teacher's unicast client never needed.

use crate::error::NetworkError;
use socket2::{Domain, Protocol, SockAddr, Socket, Type as SockType};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

/// 224.0.0.251, the mDNS multicast group (§2).
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_PORT: u16 = 5353;

/// How long a single blocking receive waits before returning control to the
/// caller so it can check for cancellation (§4.2).
pub const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A raw inbound datagram plus the interface it arrived on and the
/// originating address, for the source-address and rate-limit filters in
/// [`Transport::receive`].
pub struct Inbound {
    pub data: Vec<u8>,
    pub source: SocketAddr,
}

/// True if `ip` is a plausible mDNS peer: link-local, RFC1918 private, or
/// loopback (same-host testing). Anything else is a public address that has
/// no business sending mDNS traffic onto this link and is dropped before it
/// reaches the responder (§4.2's source-address filter).
pub fn is_acceptable_source(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_loopback(),
        IpAddr::V6(_) => false,
    }
}

/// What a concrete platform socket must provide (§6.2). Lets the state
/// machine and responder be tested against an in-memory fake instead of a
/// real multicast group.
pub trait ConfiguredSocket: Send + Sync {
    fn send_multicast(&self, data: &[u8]) -> Result<(), NetworkError>;
    fn send_unicast(&self, data: &[u8], to: SocketAddr) -> Result<(), NetworkError>;
    /// Blocks for up to `timeout`, returning `Ok(None)` on a plain timeout.
    fn receive(&self, timeout: Duration) -> Result<Option<Inbound>, NetworkError>;
    fn interface_id(&self) -> u32;
}

/// The default [`ConfiguredSocket`], bound to a single interface's
/// multicast group membership.
pub struct MulticastSocket {
    socket: UdpSocket,
    interface_id: u32,
}

impl MulticastSocket {
    /// Binds to `0.0.0.0:5353`, joins the mDNS group on `interface`, and
    /// disables multicast loopback so Beacon doesn't receive its own
    /// transmissions as if they came from a peer.
    pub fn bind(interface: Ipv4Addr, interface_id: u32) -> Result<Self, NetworkError> {
        let socket2 = Socket::new(Domain::ipv4(), SockType::dgram(), Some(Protocol::udp()))
            .map_err(NetworkError::Io)?;
        socket2.set_reuse_address(true).map_err(NetworkError::Io)?;
        #[cfg(unix)]
        socket2.set_reuse_port(true).map_err(NetworkError::Io)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT);
        socket2
            .bind(&SockAddr::from(bind_addr))
            .map_err(NetworkError::Io)?;
        socket2
            .join_multicast_v4(&MULTICAST_ADDR, &interface)
            .map_err(NetworkError::Io)?;
        socket2
            .set_multicast_loop_v4(false)
            .map_err(NetworkError::Io)?;
        socket2
            .set_multicast_ttl_v4(255)
            .map_err(NetworkError::Io)?;

        let socket: UdpSocket = socket2.into();
        socket
            .set_read_timeout(Some(RECEIVE_POLL_INTERVAL))
            .map_err(NetworkError::Io)?;

        Ok(MulticastSocket {
            socket,
            interface_id,
        })
    }
}

impl ConfiguredSocket for MulticastSocket {
    fn send_multicast(&self, data: &[u8]) -> Result<(), NetworkError> {
        let dest = SocketAddrV4::new(MULTICAST_ADDR, MDNS_PORT);
        self.socket
            .send_to(data, dest)
            .map(|_| ())
            .map_err(NetworkError::Io)
    }

    fn send_unicast(&self, data: &[u8], to: SocketAddr) -> Result<(), NetworkError> {
        self.socket
            .send_to(data, to)
            .map(|_| ())
            .map_err(NetworkError::Io)
    }

    fn receive(&self, timeout: Duration) -> Result<Option<Inbound>, NetworkError> {
        self.socket
            .set_read_timeout(Some(timeout))
            .map_err(NetworkError::Io)?;

        let mut buf = [0u8; crate::wire::MAX_MESSAGE_LEN];
        match self.socket.recv_from(&mut buf) {
            Ok((len, source)) => Ok(Some(Inbound {
                data: buf[..len].to_vec(),
                source,
            })),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(NetworkError::Io(e)),
        }
    }

    fn interface_id(&self) -> u32 {
        self.interface_id
    }
}
