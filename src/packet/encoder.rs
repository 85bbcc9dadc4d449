//! DNS message encoder.

use core::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Zeroable;

use super::{
    name::DomainName,
    records::Record,
    section::{self, Section},
    Class, Error, Header, QClass, QType, CLASS_TOP_BIT,
};

/// Writes into a fixed-size buffer, remembering the first error instead of failing every call.
pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    pub(crate) pos: usize,
    error: Option<Error>,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        self.error.get_or_insert(error);
    }

    pub(crate) fn write_slice(&mut self, data: &[u8]) {
        match self.buf.get_mut(self.pos..self.pos + data.len()) {
            Some(dest) => {
                dest.copy_from_slice(data);
                self.pos += data.len();
            }
            None => {
                self.pos = self.buf.len();
                self.fail(Error::Truncated);
            }
        }
    }

    pub(crate) fn write_u8(&mut self, b: u8) {
        self.write_slice(&[b]);
    }

    pub(crate) fn write_u16(&mut self, v: u16) {
        self.write_slice(&v.to_be_bytes());
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_slice(&v.to_be_bytes());
    }

    pub(crate) fn write_domain_name(&mut self, name: &DomainName) {
        for label in name.labels() {
            // `Label` guarantees a length of at most 63
            self.write_u8(label.as_bytes().len() as u8);
            self.write_slice(label.as_bytes());
        }
        // Implicit root label at the end.
        self.write_u8(0);
    }

    pub(crate) fn write_character_string(&mut self, string: &[u8]) {
        match u8::try_from(string.len()) {
            Ok(len) => {
                self.write_u8(len);
                self.write_slice(string);
            }
            Err(_) => self.fail(Error::Truncated),
        }
    }

    /// Writes RDATA produced by `with`, preceded by its 16-bit length.
    fn write_length_prefixed(&mut self, with: impl FnOnce(&mut Self)) {
        let lenpos = self.pos;
        self.write_u16(0);
        let start = self.pos;
        with(self);
        let end = self.pos;
        match u16::try_from(end - start) {
            Ok(len) if self.error.is_none() => {
                self.buf[lenpos..start].copy_from_slice(&len.to_be_bytes());
            }
            Ok(_) => {}
            Err(_) => self.fail(Error::Truncated),
        }
    }
}

/// Streaming encoder for DNS messages.
///
/// Like the decoder, the encoder tracks the section it writes to as the `S` type parameter, so
/// that questions and records can only be added in wire order. Section counts in the header are
/// filled in by [`MessageEncoder::finish`].
pub struct MessageEncoder<'a, S: Section> {
    w: Writer<'a>,
    header: Header,
    counts: [u16; 4],
    _p: PhantomData<S>,
}

impl<'a> MessageEncoder<'a, section::Question> {
    /// Creates a new message encoder that will write to `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let mut w = Writer::new(buf);
        w.write_slice(bytemuck::bytes_of(&Header::zeroed()));
        Self {
            w,
            header: Header::zeroed(),
            counts: [0; 4],
            _p: PhantomData,
        }
    }

    /// Adds a question to the *Question* section.
    pub fn question(&mut self, question: Question<'_>) {
        let class = if question.unicast_response {
            question.class.0 | CLASS_TOP_BIT
        } else {
            question.class.0
        };
        self.w.write_domain_name(question.name);
        self.w.write_u16(question.ty.0);
        self.w.write_u16(class);
        self.counts[0] += 1;
    }

    /// Moves the encoder to the *Answer* section.
    #[inline]
    pub fn answers(self) -> MessageEncoder<'a, section::Answer> {
        self.change_section()
    }
}

impl<'a, S: Section> MessageEncoder<'a, S> {
    /// Overrides the message header.
    ///
    /// The section counts are overwritten when the message is finished.
    pub fn set_header(&mut self, header: Header) {
        self.header = header;
    }

    fn change_section<N: Section>(self) -> MessageEncoder<'a, N> {
        MessageEncoder {
            w: self.w,
            header: self.header,
            counts: self.counts,
            _p: PhantomData,
        }
    }

    fn write_rr(&mut self, rr: ResourceRecord<'_>, section: usize) {
        let class = if rr.cache_flush {
            rr.class.0 | CLASS_TOP_BIT
        } else {
            rr.class.0
        };
        self.w.write_domain_name(rr.name);
        self.w.write_u16(rr.data.record_type().0);
        self.w.write_u16(class);
        self.w.write_u32(rr.ttl);
        self.w.write_length_prefixed(|w| rr.data.encode(w));
        self.counts[section] += 1;
    }

    /// Finishes encoding the message, and returns the number of bytes that were written to the
    /// buffer.
    ///
    /// Returns [`Error::Truncated`] if the message did not fit into the buffer.
    pub fn finish(mut self) -> Result<usize, Error> {
        if let Some(e) = self.w.error {
            return Err(e);
        }
        let [qd, an, ns, ar] = self.counts;
        self.header.set_counts(qd, an, ns, ar);
        self.w.buf[..size_of::<Header>()].copy_from_slice(bytemuck::bytes_of(&self.header));
        Ok(self.w.pos)
    }
}

impl<'a> MessageEncoder<'a, section::Answer> {
    pub fn add_answer(&mut self, rr: ResourceRecord<'_>) {
        self.write_rr(rr, 1);
    }

    /// Moves the encoder to the *Authority* section.
    #[inline]
    pub fn authority(self) -> MessageEncoder<'a, section::Authority> {
        self.change_section()
    }
}

impl<'a> MessageEncoder<'a, section::Authority> {
    pub fn add_authority(&mut self, rr: ResourceRecord<'_>) {
        self.write_rr(rr, 2);
    }

    /// Moves the encoder to the *Additional Records* section.
    #[inline]
    pub fn additional(self) -> MessageEncoder<'a, section::Additional> {
        self.change_section()
    }
}

impl<'a> MessageEncoder<'a, section::Additional> {
    pub fn add_additional(&mut self, rr: ResourceRecord<'_>) {
        self.write_rr(rr, 3);
    }
}

/// A question to add to a query.
pub struct Question<'a> {
    name: &'a DomainName,
    class: QClass,
    ty: QType,
    unicast_response: bool,
}

impl<'a> Question<'a> {
    /// Creates a question asking for all records ([`QType::ALL`]) in the internet class
    /// ([`QClass::IN`]) pertaining to `name`, with a multicast response.
    #[inline]
    pub fn new(name: &'a DomainName) -> Self {
        Self {
            name,
            class: QClass::IN,
            ty: QType::ALL,
            unicast_response: false,
        }
    }

    /// Sets the record class to query.
    #[inline]
    pub fn class(self, class: QClass) -> Self {
        Self { class, ..self }
    }

    /// Sets the resource type to query.
    #[inline]
    pub fn ty(self, ty: QType) -> Self {
        Self { ty, ..self }
    }

    /// Sets the mDNS "QU" bit, asking responders to reply directly to the querier's address and
    /// port instead of the multicast group.
    #[inline]
    pub fn unicast_response(self, unicast_response: bool) -> Self {
        Self {
            unicast_response,
            ..self
        }
    }
}

/// A resource record to add to a response.
pub struct ResourceRecord<'a> {
    name: &'a DomainName,
    class: Class,
    cache_flush: bool,
    ttl: u32,
    data: &'a Record,
}

impl<'a> ResourceRecord<'a> {
    pub fn new(name: &'a DomainName, data: &'a Record) -> Self {
        Self {
            name,
            class: Class::IN,
            cache_flush: false,
            ttl: 0,
            data,
        }
    }

    #[inline]
    pub fn ttl(self, ttl: u32) -> Self {
        Self { ttl, ..self }
    }

    #[inline]
    pub fn cache_flush(self, cache_flush: bool) -> Self {
        Self {
            cache_flush,
            ..self
        }
    }
}
