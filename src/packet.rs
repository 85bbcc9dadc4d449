//! DNS message codec, as far as mDNS service enumeration needs it.
//!
//! [`decoder::Message`] turns a received datagram into owned sections of typed records,
//! [`encoder::MessageEncoder`] writes queries (and, for tests and tooling, responses) into a
//! caller-provided buffer.

#[macro_use]
mod macros;
pub mod decoder;
pub mod encoder;
mod error;
pub mod name;
pub mod records;
pub mod section;

use core::fmt;

use bitflags::bitflags;

pub use error::Error;

/// Big-endian `u16` as it appears on the wire.
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub(crate) struct Be16([u8; 2]);

impl Be16 {
    pub(crate) fn get(self) -> u16 {
        u16::from_be_bytes(self.0)
    }
}

impl From<u16> for Be16 {
    fn from(value: u16) -> Self {
        Self(value.to_be_bytes())
    }
}

ffi_enum! {
    /// Resource record types.
    ///
    /// Only the types that show up in DNS-SD traffic are named; everything else is still
    /// representable and printed as `(unknown Type: ..)`.
    pub enum Type: u16 {
        A = 1,
        NS = 2,
        CNAME = 5,
        SOA = 6,
        PTR = 12,
        HINFO = 13,
        TXT = 16,
        AAAA = 28,
        SRV = 33,
        OPT = 41,
        NSEC = 47,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

ffi_enum! {
    /// The record type a question asks for.
    pub enum QType: u16 {
        // Prefix is identical to `Type`.
        A = 1,
        NS = 2,
        CNAME = 5,
        SOA = 6,
        PTR = 12,
        HINFO = 13,
        TXT = 16,
        AAAA = 28,
        SRV = 33,
        NSEC = 47,

        /// Query is for all record types.
        ALL = 255,
    }
}

impl QType {
    pub fn matches(&self, ty: Type) -> bool {
        *self == Self::ALL || self.0 == ty.0
    }
}

impl fmt::Display for QType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

ffi_enum! {
    /// Resource record classes.
    ///
    /// mDNS repurposes the top bit of the class field, so values here never have it set; it is
    /// split off by the decoder (see [`decoder::ResourceRecord::cache_flush`] and
    /// [`decoder::Question::unicast_response`]).
    pub enum Class: u16 {
        /// The Internet.
        IN = 1,
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

ffi_enum! {
    /// The queried resource class.
    pub enum QClass: u16 {
        /// The Internet.
        IN = 1,
        /// Query is for all classes of resource.
        ANY = 255,
    }
}

impl fmt::Display for QClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Top bit of the class field.
///
/// In questions it requests a unicast response (RFC 6762 section 5.4), in resource records it is
/// the cache-flush bit (RFC 6762 section 10.2).
pub(crate) const CLASS_TOP_BIT: u16 = 0x8000;

// Bit positions in the header flags are inverted, because RFC 1035 starts counting at the MSb.
const fn be_pos(pos: u16) -> u16 {
    15 - pos
}

bitflags! {
    #[derive(Debug, Clone, Copy)]
    #[repr(transparent)]
    struct HeaderFlags: u16 {
        /// If set, the message is a response to a query. If unset, it is a query.
        const QR = 1 << be_pos(0);
        const OPCODE = 0b1111 << 11;
        /// Authoritative answer. mDNS responders always set this.
        const AA = 1 << be_pos(5);
        /// Set if the message was truncated to fit the transmission channel.
        const TC = 1 << be_pos(6);
        const RD = 1 << be_pos(7);
        const RA = 1 << be_pos(8);
        const Z = 0b111 << be_pos(11);
        const RCODE = 0b1111;
    }
}

/// Packet header.
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Header {
    id: Be16,
    flags: Be16,
    qdcount: Be16,
    ancount: Be16,
    nscount: Be16,
    arcount: Be16,
}

impl Header {
    fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(self.flags.get())
    }

    fn modify_flags(&mut self, with: impl FnOnce(&mut HeaderFlags)) {
        let mut flags = self.flags();
        with(&mut flags);
        self.flags = flags.bits().into();
    }

    /// Returns the 16-bit transaction ID.
    ///
    /// Responders copy this ID into the response, which is what lets a client match responses to
    /// the query that caused them. Unsolicited multicast announcements carry ID 0.
    #[inline]
    pub fn id(&self) -> u16 {
        self.id.get()
    }

    #[inline]
    pub fn set_id(&mut self, id: u16) {
        self.id = id.into();
    }

    #[inline]
    pub fn is_query(&self) -> bool {
        !self.is_response()
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.flags().contains(HeaderFlags::QR)
    }

    pub fn set_response(&mut self, is_response: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::QR, is_response));
    }

    pub fn is_authority(&self) -> bool {
        self.flags().contains(HeaderFlags::AA)
    }

    pub fn set_authority(&mut self, aa: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::AA, aa));
    }

    /// Returns whether the truncation flag is set.
    pub fn is_truncated(&self) -> bool {
        self.flags().contains(HeaderFlags::TC)
    }

    pub fn set_truncated(&mut self, trunc: bool) {
        self.modify_flags(|f| f.set(HeaderFlags::TC, trunc));
    }

    pub fn question_count(&self) -> u16 {
        self.qdcount.get()
    }

    pub fn answer_count(&self) -> u16 {
        self.ancount.get()
    }

    pub fn authority_count(&self) -> u16 {
        self.nscount.get()
    }

    pub fn additional_count(&self) -> u16 {
        self.arcount.get()
    }

    fn set_counts(&mut self, qd: u16, an: u16, ns: u16, ar: u16) {
        self.qdcount = qd.into();
        self.ancount = an.into();
        self.nscount = ns.into();
        self.arcount = ar.into();
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("id", &self.id())
            .field("flags", &self.flags())
            .field("qdcount", &self.question_count())
            .field("ancount", &self.answer_count())
            .field("nscount", &self.authority_count())
            .field("arcount", &self.additional_count())
            .finish()
    }
}
