//! Service type enumeration and response routing.
//!
//! [`Browser`] is a state machine without I/O: feed it received datagrams through
//! [`Browser::handle_datagram`] and send whatever [`Browser::poll_transmit`] yields. [`run`] does
//! both over a blocking [`Transport`].

use std::{
    collections::VecDeque,
    io::Write,
    net::SocketAddr,
};

use crate::{
    packet::{decoder::Message, name::DomainName, records::Record, QType},
    query::{Query, QueryIds},
    service::{ServiceInstance, ServiceTypes},
    transport::{Transport, TransportError},
    Error, Hex, MAX_DATAGRAM_SIZE, MDNS_BUFFER_SIZE, MDNS_GROUP_V4,
    SERVICE_TYPE_ENUMERATION_NAME,
};

/// Browser configuration.
#[derive(Debug, Clone)]
pub struct Config {
    group: SocketAddr,
    show_addresses: bool,
}

impl Config {
    /// Creates the default configuration: query the IPv4 mDNS group, print four columns.
    pub fn new() -> Self {
        Self {
            group: MDNS_GROUP_V4,
            show_addresses: false,
        }
    }

    /// Sets the address all queries are sent to.
    ///
    /// Defaults to [`MDNS_GROUP_V4`]. The transport must be able to reach this address, so an IPv6
    /// group needs an IPv6 transport.
    pub fn group(self, group: SocketAddr) -> Self {
        Self { group, ..self }
    }

    /// Sets whether output lines get a fifth column listing the instance's addresses.
    pub fn show_addresses(self, show_addresses: bool) -> Self {
        Self {
            show_addresses,
            ..self
        }
    }

    #[inline]
    pub fn group_addr(&self) -> SocketAddr {
        self.group
    }

    #[inline]
    pub fn shows_addresses(&self) -> bool {
        self.show_addresses
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// A datagram the [`Browser`] wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub data: Vec<u8>,
    pub dest: SocketAddr,
}

/// Enumerates service types and turns responses into [`ServiceInstance`]s.
///
/// Responses are told apart by transaction ID alone: a response carrying the ID of the
/// enumeration query lists service types, and every new type is queried in turn. Any other
/// response describes a service instance.
///
/// The browser never considers itself done, since mDNS has no "that was everything" signal. Stop
/// feeding it when you have waited long enough.
#[derive(Debug)]
pub struct Browser {
    config: Config,
    ids: QueryIds,
    enumeration_id: Option<u16>,
    service_types: ServiceTypes,
    transmits: VecDeque<Transmit>,
}

impl Browser {
    /// Creates a browser that draws query IDs from a randomly seeded [`QueryIds`].
    pub fn new(config: Config) -> Self {
        Self::with_query_ids(config, QueryIds::new())
    }

    pub fn with_query_ids(config: Config, ids: QueryIds) -> Self {
        Self {
            config,
            ids,
            enumeration_id: None,
            service_types: ServiceTypes::new(),
            transmits: VecDeque::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the transaction ID of the enumeration query, once [`Browser::start`] has been
    /// called.
    #[inline]
    pub fn enumeration_id(&self) -> Option<u16> {
        self.enumeration_id
    }

    /// Returns the service types queried so far.
    #[inline]
    pub fn service_types(&self) -> &ServiceTypes {
        &self.service_types
    }

    /// Queues the service type enumeration query.
    ///
    /// Calling this again sends a new enumeration query, and responses to the previous one are
    /// treated as instance responses from then on.
    pub fn start(&mut self) -> Result<(), Error> {
        let name = DomainName::from_str(SERVICE_TYPE_ENUMERATION_NAME)?;
        let query = Query::new(&mut self.ids, name, QType::PTR);
        log::debug!("enumerating service types with query id {}", query.id());
        self.enumeration_id = Some(query.id());
        self.queue(&query)
    }

    /// Returns the next datagram to send, if any.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    /// Processes a datagram received from `from`.
    ///
    /// Returns the assembled instance if the datagram was an instance response. Datagrams that
    /// fail to decode are logged and dropped.
    ///
    /// The only error is a follow-up query that cannot be encoded.
    pub fn handle_datagram(
        &mut self,
        data: &[u8],
        from: SocketAddr,
    ) -> Result<Option<ServiceInstance>, Error> {
        log::trace!("recv from {}: {}", from, Hex(data));
        let msg = match Message::decode(data) {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!("bad response from {from}: {err}");
                return Ok(None);
            }
        };
        log::trace!("header from {}: {:?}", from, msg.header());

        if Some(msg.header().id()) == self.enumeration_id {
            self.handle_enumeration_response(&msg)?;
            return Ok(None);
        }

        for rr in msg.answers().iter().chain(msg.additional()) {
            log::debug!("{from}: {rr}");
        }
        let instance = ServiceInstance::assemble(msg.answers().iter().chain(msg.additional()));
        Ok(Some(instance))
    }

    fn handle_enumeration_response(&mut self, msg: &Message) -> Result<(), Error> {
        for rr in msg.answers() {
            let Record::PTR(ptr) = rr.data() else {
                continue;
            };
            let service_type = ptr.ptrdname();
            if !self.service_types.mark_seen(service_type.clone()) {
                log::trace!("already queried {service_type}");
                continue;
            }

            let query = Query::new(&mut self.ids, service_type.clone(), QType::PTR);
            log::debug!(
                "new service type {}, querying with id {}",
                service_type,
                query.id()
            );
            self.queue(&query)?;
        }
        Ok(())
    }

    fn queue(&mut self, query: &Query) -> Result<(), Error> {
        log::trace!("queueing {} query for {}", query.kind(), query.name());
        let mut buf = [0; MDNS_BUFFER_SIZE];
        let data = query.encode(&mut buf)?;
        self.transmits.push_back(Transmit {
            data: data.to_vec(),
            dest: self.config.group,
        });
        Ok(())
    }
}

/// Runs `browser` over `transport` and writes one line per instance response to `out`.
///
/// Sends the enumeration query, then handles datagrams in arrival order until the transport is
/// closed, which ends the run successfully. Each line is flushed as soon as it is written.
pub fn run<T, W>(browser: &mut Browser, transport: T, mut out: W) -> Result<(), Error>
where
    T: Transport,
    W: Write,
{
    browser.start()?;

    let mut buf = vec![0; MAX_DATAGRAM_SIZE];
    'run: loop {
        while let Some(transmit) = browser.poll_transmit() {
            log::trace!("send to {}: {}", transmit.dest, Hex(&transmit.data));
            match transport.send_to(&transmit.data, transmit.dest) {
                Ok(()) => {}
                Err(TransportError::Closed) => break 'run,
                Err(TransportError::Io(e)) => return Err(e.into()),
            }
        }

        let (len, from) = match transport.recv_from(&mut buf) {
            Ok(res) => res,
            Err(TransportError::Closed) => break,
            Err(TransportError::Io(e)) => return Err(e.into()),
        };
        if let Some(instance) = browser.handle_datagram(&buf[..len], from)? {
            writeln!(out, "{}", instance.line(browser.config.show_addresses))?;
            out.flush()?;
        }
    }

    log::debug!(
        "transport closed after querying {} service types",
        browser.service_types.len()
    );
    for service_type in browser.service_types.iter() {
        log::debug!("queried {service_type}");
    }
    Ok(())
}
