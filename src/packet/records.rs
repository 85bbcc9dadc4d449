//! Resource record data.
//!
//! Each supported record type has its own struct implementing [`RecordData`]; [`Record`] ties them
//! together and keeps unsupported types around as raw bytes.

use std::{
    fmt::{self, Write},
    net::{Ipv4Addr, Ipv6Addr},
};

use super::{decoder::Reader, encoder::Writer, name::DomainName, Error, Type};

/// Trait implemented by all supported resource record types.
pub(crate) trait RecordData: Sized {
    /// The associated resource record type.
    const TYPE: Type;

    /// Writes the RDATA of this record.
    fn encode(&self, w: &mut Writer<'_>);

    /// Decodes an instance of this record from an RDATA field.
    fn decode(r: &mut Reader<'_>) -> Result<Self, Error>;
}

macro_rules! records {
    (
        $($record:ident),+ $(,)?
    ) => {
        /// Record data of a resource record.
        #[derive(Debug, PartialEq, Eq, Clone)]
        pub enum Record {
            $( $record($record), )+
            /// A record of a type this crate does not interpret.
            Other(Unknown),
        }

        impl Record {
            /// Decodes RDATA of type `ty`. The reader must be limited to the RDATA field.
            pub(crate) fn decode(ty: Type, r: &mut Reader<'_>) -> Result<Self, Error> {
                let rec = match ty {
                    $( Type::$record => $record::decode(r).map(Self::$record)?, )+
                    _ => Self::Other(Unknown {
                        ty,
                        data: r.read_slice(r.buf().len())?.to_vec(),
                    }),
                };
                if !r.buf().is_empty() {
                    return Err(Error::TrailingData);
                }
                Ok(rec)
            }

            pub(crate) fn encode(&self, w: &mut Writer<'_>) {
                match self {
                    $( Record::$record(rr) => rr.encode(w), )+
                    Record::Other(unknown) => w.write_slice(&unknown.data),
                }
            }

            pub fn record_type(&self) -> Type {
                match self {
                    $( Record::$record(_) => <$record as RecordData>::TYPE, )+
                    Record::Other(unknown) => unknown.ty,
                }
            }
        }

        $(
            impl From<$record> for Record {
                fn from(rec: $record) -> Self {
                    Self::$record(rec)
                }
            }
        )+

        impl fmt::Display for Record {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( Record::$record(r) => fmt::Display::fmt(r, f), )+
                    Record::Other(r) => fmt::Display::fmt(r, f),
                }
            }
        }
    };
}

records!(A, AAAA, PTR, SRV, TXT);

/// Raw RDATA of a record type without dedicated support.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Unknown {
    ty: Type,
    data: Vec<u8>,
}

impl Unknown {
    pub fn new(ty: Type, data: Vec<u8>) -> Self {
        Self { ty, data }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for Unknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x?}", self.data)
    }
}

/// IPv4 host address.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct A {
    addr: Ipv4Addr,
}

impl RecordData for A {
    const TYPE: Type = Type::A;

    fn encode(&self, w: &mut Writer<'_>) {
        w.write_slice(&self.addr.octets())
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            addr: Ipv4Addr::from(*r.read_array()?),
        })
    }
}

impl A {
    #[inline]
    pub fn new(addr: Ipv4Addr) -> Self {
        Self { addr }
    }

    #[inline]
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
}

impl fmt::Display for A {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}

/// IPv6 host address.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AAAA {
    addr: Ipv6Addr,
}

impl RecordData for AAAA {
    const TYPE: Type = Type::AAAA;

    fn encode(&self, w: &mut Writer<'_>) {
        w.write_slice(&self.addr.octets());
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            addr: Ipv6Addr::from(*r.read_array()?),
        })
    }
}

impl AAAA {
    #[inline]
    pub fn new(addr: Ipv6Addr) -> Self {
        Self { addr }
    }

    #[inline]
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }
}

impl fmt::Display for AAAA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}

/// Domain name pointer.
///
/// DNS-SD uses these both to list service types
/// (`_services._dns-sd._udp.local.` → `_http._tcp.local.`) and to list the instances of a type
/// (`_http._tcp.local.` → `My Printer._http._tcp.local.`).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PTR {
    ptrdname: DomainName,
}

impl RecordData for PTR {
    const TYPE: Type = Type::PTR;

    fn encode(&self, w: &mut Writer<'_>) {
        w.write_domain_name(&self.ptrdname);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ptrdname: r.read_domain_name()?,
        })
    }
}

impl PTR {
    pub fn new(ptrdname: DomainName) -> Self {
        Self { ptrdname }
    }

    pub fn ptrdname(&self) -> &DomainName {
        &self.ptrdname
    }
}

impl fmt::Display for PTR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.ptrdname, f)
    }
}

/// Text strings attached to a name; DNS-SD stores `key=value` metadata in them.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TXT {
    entries: Vec<Vec<u8>>,
}

impl RecordData for TXT {
    const TYPE: Type = Type::TXT;

    fn encode(&self, w: &mut Writer<'_>) {
        for entry in self.entries() {
            w.write_character_string(entry);
        }
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        let mut entries = Vec::new();

        // Technically at least one is required, but we accept 0 too.
        while !r.buf().is_empty() {
            entries.push(r.read_character_string()?.to_vec());
        }

        Ok(Self { entries })
    }
}

impl TXT {
    /// Creates a [`TXT`] record from a list of *character strings*.
    ///
    /// Entries longer than 255 bytes cannot be encoded and make the encoder report
    /// [`Error::Truncated`].
    pub fn new<I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns an iterator over all *character string* values in this record.
    pub fn entries(&self) -> impl Iterator<Item = &'_ [u8]> {
        self.entries.iter().map(|e| &**e)
    }
}

impl fmt::Display for TXT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries().enumerate() {
            if i != 0 {
                f.write_char(' ')?;
            }
            write!(f, "\"{}\"", entry.escape_ascii())?;
        }
        Ok(())
    }
}

/// Service location: where an instance can be reached.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SRV {
    priority: u16,
    weight: u16,
    port: u16,
    target: DomainName,
}

impl RecordData for SRV {
    const TYPE: Type = Type::SRV;

    fn encode(&self, w: &mut Writer<'_>) {
        w.write_u16(self.priority);
        w.write_u16(self.weight);
        w.write_u16(self.port);
        w.write_domain_name(&self.target);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            priority: r.read_u16()?,
            weight: r.read_u16()?,
            port: r.read_u16()?,
            target: r.read_domain_name()?,
        })
    }
}

impl SRV {
    pub fn new(priority: u16, weight: u16, port: u16, target: DomainName) -> Self {
        Self {
            priority,
            weight,
            port,
            target,
        }
    }

    /// Returns the priority value of this service (lower values mean that the service should be
    /// preferred).
    #[inline]
    pub fn priority(&self) -> u16 {
        self.priority
    }

    #[inline]
    pub fn weight(&self) -> u16 {
        self.weight
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host name the service runs on.
    #[inline]
    pub fn target(&self) -> &DomainName {
        &self.target
    }
}

impl fmt::Display for SRV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.target,
        )
    }
}
