//! Multicast DNS service enumeration.
//!
//! [`browser::Browser`] asks the local network which DNS-SD service types are advertised, queries
//! each new type once, and folds every other response it receives into a one-line
//! [`service::ServiceInstance`]. The browser itself does no I/O; [`browser::run`] drives it over a
//! [`transport::Transport`] until a [`cancel::Watcher`] closes that transport.

use std::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
};

pub mod browser;
pub mod cancel;
mod error;
pub mod packet;
pub mod query;
pub mod service;
pub mod transport;

pub use error::Error;

/// Size of multicast DNS message buffers.
///
/// RFC 6762 allows mDNS messages of up to 9000 bytes (jumbo frames), so this is what queries are
/// encoded into.
pub const MDNS_BUFFER_SIZE: usize = 9000;

/// Size of the buffer datagrams are received into.
///
/// Responders do not always stay within [`MDNS_BUFFER_SIZE`], and a truncated datagram would fail
/// to decode, so receiving uses the largest possible UDP payload instead.
pub const MAX_DATAGRAM_SIZE: usize = 0xffff;

/// The IPv4 mDNS group, `224.0.0.251:5353`.
pub const MDNS_GROUP_V4: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(224, 0, 0, 251), 5353));

/// The IPv6 mDNS group, `[ff02::fb]:5353`.
pub const MDNS_GROUP_V6: SocketAddr = SocketAddr::V6(SocketAddrV6::new(
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb),
    5353,
    0,
    0,
));

/// The DNS-SD meta-query name whose PTR records list every advertised service type.
pub const SERVICE_TYPE_ENUMERATION_NAME: &str = "_services._dns-sd._udp.local.";

/// Formats bytes as lowercase hex, for trace logs of raw datagrams.
pub(crate) struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups() {
        assert_eq!(MDNS_GROUP_V4.to_string(), "224.0.0.251:5353");
        assert_eq!(MDNS_GROUP_V6.to_string(), "[ff02::fb]:5353");
        assert!(MDNS_GROUP_V4.ip().is_multicast());
        assert!(MDNS_GROUP_V6.ip().is_multicast());
    }

    #[test]
    fn hex() {
        assert_eq!(Hex(&[0x00, 0xab, 0xff]).to_string(), "00abff");
        assert_eq!(Hex(&[]).to_string(), "");
    }
}
