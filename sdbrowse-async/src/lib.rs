//! Async driver for [`sdbrowse`].
//!
//! Runs the same [`Browser`] as [`sdbrowse::browser::run`], but over an [`async_io`] socket.
//! Instead of closing the transport from another thread, the run ends when a caller-provided
//! future completes.

use std::{
    future::Future,
    io::{self, Write},
    net::{SocketAddr, UdpSocket},
    pin::pin,
    time::Duration,
};

use async_io::{Async, Timer};
use futures_lite::future;
use sdbrowse::{
    browser::Browser,
    transport::{bind_socket, unspecified_for},
    Error, MAX_DATAGRAM_SIZE,
};

pub use sdbrowse::browser::Config;

/// An async UDP socket set up like [`sdbrowse::transport::UdpTransport`].
pub struct AsyncUdpTransport {
    sock: Async<UdpSocket>,
}

impl AsyncUdpTransport {
    /// Creates a transport for querying `group`, bound to an ephemeral port on all interfaces.
    pub fn new(group: SocketAddr) -> io::Result<Self> {
        Self::bind(unspecified_for(group))
    }

    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let sock = Async::new(bind_socket(addr)?)?;
        log::debug!("bound async UDP socket to {}", sock.get_ref().local_addr()?);
        Ok(Self { sock })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.sock.get_ref().local_addr()
    }

    pub async fn send_to(&self, data: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.sock.send_to(data, dest).await?;
        Ok(())
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.sock.recv_from(buf).await
    }
}

/// Runs `browser` over `transport` until `cancel` completes, writing one line per instance
/// response to `out`.
///
/// Completion of `cancel` is a successful end of the run. Lines are flushed as they are written.
pub async fn run<W, C>(
    browser: &mut Browser,
    transport: &AsyncUdpTransport,
    mut out: W,
    cancel: C,
) -> Result<(), Error>
where
    W: Write,
    C: Future<Output = ()>,
{
    let mut cancel = pin!(cancel);
    browser.start()?;

    let mut buf = vec![0; MAX_DATAGRAM_SIZE];
    loop {
        while let Some(transmit) = browser.poll_transmit() {
            transport.send_to(&transmit.data, transmit.dest).await?;
        }

        let recv = async { Some(transport.recv_from(&mut buf).await) };
        let cancelled = async {
            cancel.as_mut().await;
            None
        };
        let Some(res) = future::or(recv, cancelled).await else {
            break;
        };
        let (len, from) = res?;

        if let Some(instance) = browser.handle_datagram(&buf[..len], from)? {
            writeln!(out, "{}", instance.line(browser.config().shows_addresses()))?;
            out.flush()?;
        }
    }

    log::debug!(
        "cancelled after querying {} service types",
        browser.service_types().len()
    );
    for service_type in browser.service_types().iter() {
        log::debug!("queried {service_type}");
    }
    Ok(())
}

/// Returns a future that completes after `timeout`, or never if `timeout` is `None`.
///
/// Meant as the `cancel` argument of [`run`].
pub async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => {
            Timer::after(timeout).await;
        }
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::Ipv4Addr,
        thread,
        time::Instant,
    };

    use sdbrowse::{
        packet::{
            decoder::Message,
            encoder::{MessageEncoder, ResourceRecord},
            name::DomainName,
            records::{Record, PTR, SRV},
            Header,
        },
        MDNS_BUFFER_SIZE, SERVICE_TYPE_ENUMERATION_NAME,
    };

    use super::*;

    fn loopback() -> SocketAddr {
        (Ipv4Addr::LOCALHOST, 0).into()
    }

    fn name(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    fn response(id: u16, records: &[(DomainName, Record)]) -> Vec<u8> {
        let mut buf = [0; MDNS_BUFFER_SIZE];
        let mut header = Header::default();
        header.set_id(id);
        header.set_response(true);
        let mut enc = MessageEncoder::new(&mut buf).answers();
        enc.set_header(header);
        for (owner, data) in records {
            enc.add_answer(ResourceRecord::new(owner, data));
        }
        let len = enc.finish().unwrap();
        buf[..len].to_vec()
    }

    /// Answers the enumeration query with one service type, and the follow-up with one instance.
    fn responder() -> (SocketAddr, thread::JoinHandle<()>) {
        let sock = UdpSocket::bind(loopback()).unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let addr = sock.local_addr().unwrap();
        let thread = thread::spawn(move || {
            let mut buf = [0; MDNS_BUFFER_SIZE];
            for _ in 0..2 {
                let (len, from) = sock.recv_from(&mut buf).unwrap();
                let query = Message::decode(&buf[..len]).unwrap();
                let id = query.header().id();
                let qname = query.questions()[0].name().to_string();
                let reply = if qname == SERVICE_TYPE_ENUMERATION_NAME {
                    response(
                        id,
                        &[(
                            name(SERVICE_TYPE_ENUMERATION_NAME),
                            PTR::new(name("_ipp._tcp.local")).into(),
                        )],
                    )
                } else {
                    assert_eq!(qname, "_ipp._tcp.local.");
                    response(
                        id,
                        &[
                            (
                                name("_ipp._tcp.local"),
                                PTR::new(name("Laser._ipp._tcp.local")).into(),
                            ),
                            (
                                name("Laser._ipp._tcp.local"),
                                SRV::new(0, 0, 631, name("laser.local")).into(),
                            ),
                        ],
                    )
                };
                sock.send_to(b"\x00", from).unwrap();
                sock.send_to(&reply, from).unwrap();
            }
        });
        (addr, thread)
    }

    #[test]
    fn run_until_deadline() {
        let (addr, responder) = responder();
        let transport = AsyncUdpTransport::bind(loopback()).unwrap();
        let mut browser = Browser::new(Config::new().group(addr));
        let mut out = Vec::new();

        future::block_on(run(
            &mut browser,
            &transport,
            &mut out,
            deadline(Some(Duration::from_millis(1000))),
        ))
        .unwrap();
        responder.join().unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "tcp\tipp\tlaser.local:631\tLaser\n"
        );
        assert!(browser.service_types().seen(&name("_ipp._tcp.local")));
    }

    #[test]
    fn cancelled_immediately() {
        let transport = AsyncUdpTransport::bind(loopback()).unwrap();
        let mut browser = Browser::new(Config::new().group(transport.local_addr().unwrap()));
        let mut out = Vec::new();
        future::block_on(run(&mut browser, &transport, &mut out, future::ready(()))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn deadline_elapses() {
        let start = Instant::now();
        future::block_on(deadline(Some(Duration::from_millis(20))));
        assert!(start.elapsed() >= Duration::from_millis(20));

        let never = future::block_on(future::or(
            async {
                deadline(None).await;
                false
            },
            async {
                Timer::after(Duration::from_millis(20)).await;
                true
            },
        ));
        assert!(never);
    }
}
