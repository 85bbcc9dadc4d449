//! Datagram transport.
//!
//! The browser only needs to send a datagram to an address and to receive one with its source
//! address, plus a way for another thread to make a blocked receive give up. [`Transport`]
//! captures exactly that, so that the run loop can be exercised against something other than a
//! real multicast socket.

use std::{
    fmt, io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use socket2::{Domain, Protocol, Socket, Type};

/// Error returned by [`Transport`] operations.
#[derive(Debug)]
pub enum TransportError {
    /// The transport was closed through its [`CloseHandle`].
    ///
    /// This is how a run is meant to end, not a failure.
    Closed,
    /// The underlying socket failed.
    Io(io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => f.write_str("transport closed"),
            TransportError::Io(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Closed => None,
            TransportError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// A datagram transport the browser can be driven over.
pub trait Transport {
    /// Sends `data` as a single datagram to `dest`.
    fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<(), TransportError>;

    /// Blocks until a datagram arrives, writes it to `buf` and returns its length and source.
    ///
    /// Datagrams longer than `buf` are truncated.
    fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        (**self).send_to(data, dest)
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        (**self).recv_from(buf)
    }
}

/// Closes a transport from another thread.
///
/// Cloning yields another handle to the same transport. Closing is permanent and idempotent.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
}

impl CloseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the transport. Pending and future operations fail with
    /// [`TransportError::Closed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::debug!("closing transport");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Creates a UDP socket bound to `addr`, configured for sending mDNS queries.
///
/// Multicast loopback is enabled, so that responders on the local host see the queries, and the
/// multicast TTL (or hop limit) is 255 as RFC 6762 requires. IPv6 sockets are IPv6-only.
pub fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let sock = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        sock.set_only_v6(true)?;
        sock.set_multicast_loop_v6(true)?;
        sock.set_multicast_hops_v6(255)?;
    } else {
        sock.set_multicast_loop_v4(true)?;
        sock.set_multicast_ttl_v4(255)?;
    }
    sock.bind(&addr.into())?;
    Ok(UdpSocket::from(sock))
}

/// Returns the wildcard address with an ephemeral port in the same family as `group`.
pub fn unspecified_for(group: SocketAddr) -> SocketAddr {
    if group.is_ipv6() {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    }
}

/// A blocking UDP [`Transport`].
///
/// Receiving polls the [`CloseHandle`] every [`UdpTransport::POLL_INTERVAL`], so a close takes
/// effect within that time even if no datagrams arrive.
#[derive(Debug)]
pub struct UdpTransport {
    sock: UdpSocket,
    closed: CloseHandle,
}

impl UdpTransport {
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Creates a transport for querying `group`, bound to an ephemeral port on all interfaces.
    ///
    /// Responses to queries with the unicast-response bit come back to this port.
    pub fn new(group: SocketAddr) -> io::Result<Self> {
        Self::bind(unspecified_for(group))
    }

    /// Creates a transport bound to `addr`.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let sock = bind_socket(addr)?;
        sock.set_read_timeout(Some(Self::POLL_INTERVAL))?;
        log::debug!("bound UDP socket to {}", sock.local_addr()?);
        Ok(Self {
            sock,
            closed: CloseHandle::new(),
        })
    }

    /// Returns a handle that closes this transport.
    pub fn close_handle(&self) -> CloseHandle {
        self.closed.clone()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.sock.local_addr()
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        if self.closed.is_closed() {
            return Err(TransportError::Closed);
        }
        self.sock.send_to(data, dest)?;
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        loop {
            if self.closed.is_closed() {
                return Err(TransportError::Closed);
            }
            match self.sock.recv_from(buf) {
                // A datagram that arrived after `close` must not be handed out.
                Ok(_) if self.closed.is_closed() => return Err(TransportError::Closed),
                Ok(res) => return Ok(res),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
