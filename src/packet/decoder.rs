//! DNS message decoder.

use std::{cmp, fmt, mem::size_of};

use bytemuck::AnyBitPattern;

use super::{
    name::{DomainName, Label},
    records::Record,
    Be16, Class, Error, Header, QClass, QType, Type, CLASS_TOP_BIT,
};

/// Cursor over a received DNS message.
///
/// Name compression pointers may refer to anything *before* the current position, so the reader
/// always keeps the whole message around, even when it has been limited to a single RDATA field.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    /// The buffer containing the whole DNS message (up to the end of the current field).
    full_buf: &'a [u8],
    /// The current reader position in the buffer.
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            full_buf: buf,
            pos: 0,
        }
    }

    /// Returns the unread part of the buffer.
    pub(crate) fn buf(&self) -> &'a [u8] {
        &self.full_buf[self.pos..]
    }

    fn read_obj<T: AnyBitPattern>(&mut self) -> Result<T, Error> {
        let bytes = self.buf().get(..size_of::<T>()).ok_or(Error::Eof)?;
        self.pos += size_of::<T>();
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn peek_u8(&self) -> Result<u8, Error> {
        self.full_buf.get(self.pos).copied().ok_or(Error::Eof)
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(len).ok_or(Error::Eof)?;
        let slice = self.full_buf.get(self.pos..end).ok_or(Error::Eof)?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_array<const LEN: usize>(&mut self) -> Result<&'a [u8; LEN], Error> {
        let slice = self.read_slice(LEN)?;
        slice.try_into().map_err(|_| Error::Eof)
    }

    /// Splits off another `Reader` at the current position, with a backing store truncated to
    /// `self.pos + len`, and skips `self` past those `len` bytes.
    fn split_off(&mut self, len: usize) -> Result<Reader<'a>, Error> {
        if self.buf().len() < len {
            return Err(Error::Eof);
        }
        let mut copy = self.clone();
        copy.full_buf = &copy.full_buf[..self.pos + len];
        self.pos += len;
        Ok(copy)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Error> {
        self.read_obj::<u8>()
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(self.read_obj::<Be16>()?.get())
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(*self.read_array()?))
    }

    /// Reads a `<character-string>` value.
    pub(crate) fn read_character_string(&mut self) -> Result<&'a [u8], Error> {
        let length = self.read_u8()?;
        self.read_slice(length.into())
    }

    /// Reads a `<domain-name>` value, following compression pointers.
    pub(crate) fn read_domain_name(&mut self) -> Result<DomainName, Error> {
        let mut domain_name = DomainName::ROOT;
        let mut min_pos = self.pos;
        let mut copy = self.clone();
        loop {
            let length = copy.peek_u8()?;
            match length & 0b1100_0000 {
                0b1100_0000 => {
                    // 14-bit pointer to somewhere else in the message.
                    let ptr = usize::from(copy.read_u16()? & 0b0011_1111_1111_1111);
                    if ptr >= min_pos {
                        // Pointers must go strictly backwards, which rules out loops.
                        return Err(Error::PointerLoop);
                    }
                    self.pos = cmp::max(self.pos, copy.pos);
                    min_pos = ptr;
                    copy.pos = ptr;
                }
                0b0000_0000 => {
                    copy.pos += 1;

                    let length = usize::from(length);
                    if length == 0 {
                        break;
                    }
                    let label = copy.read_slice(length)?;
                    domain_name.push_label(Label::try_new(label)?);
                }
                _ => return Err(Error::InvalidValue), // 01 and 10 prefixes are reserved
            }
        }

        self.pos = cmp::max(self.pos, copy.pos);
        if domain_name.encoded_len() > DomainName::MAX_ENCODED_LEN {
            return Err(Error::InvalidValue);
        }
        Ok(domain_name)
    }

    fn read_question(&mut self) -> Result<Question, Error> {
        let name = self.read_domain_name()?;
        let qtype = QType(self.read_u16()?);
        let raw_class = self.read_u16()?;
        Ok(Question {
            name,
            qtype,
            qclass: QClass(raw_class & !CLASS_TOP_BIT),
            unicast_response: raw_class & CLASS_TOP_BIT != 0,
        })
    }

    fn read_resource_record(&mut self) -> Result<ResourceRecord, Error> {
        let name = self.read_domain_name()?;
        let ty = Type(self.read_u16()?);
        let raw_class = self.read_u16()?;
        let ttl = self.read_u32()?;
        let rdlength = self.read_u16()?;
        let mut rdata = self.split_off(usize::from(rdlength))?;
        let data = Record::decode(ty, &mut rdata)?;
        Ok(ResourceRecord {
            name,
            class: Class(raw_class & !CLASS_TOP_BIT),
            cache_flush: raw_class & CLASS_TOP_BIT != 0,
            ttl,
            data,
        })
    }

    fn read_records(&mut self, count: u16) -> Result<Vec<ResourceRecord>, Error> {
        (0..count).map(|_| self.read_resource_record()).collect()
    }
}

/// A fully decoded DNS message.
///
/// Decoding is all-or-nothing: a structural problem anywhere in the message (including inside the
/// RDATA of a supported record type) fails the whole decode. Records of unsupported types are kept
/// as [`Record::Other`].
#[derive(Debug)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
    authority: Vec<ResourceRecord>,
    additional: Vec<ResourceRecord>,
}

impl Message {
    /// Decodes a DNS message from `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let header = r.read_obj::<Header>()?;
        let questions = (0..header.question_count())
            .map(|_| r.read_question())
            .collect::<Result<_, _>>()?;
        let answers = r.read_records(header.answer_count())?;
        let authority = r.read_records(header.authority_count())?;
        let additional = r.read_records(header.additional_count())?;
        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }

    /// Returns the message header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[inline]
    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    #[inline]
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Returns the *Additional Records* section.
    ///
    /// mDNS responders put the SRV, TXT and address records belonging to an answered PTR here.
    #[inline]
    pub fn additional(&self) -> &[ResourceRecord] {
        &self.additional
    }
}

/// A Resource Record from the *Answer*, *Authority*, or *Additional Records* section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    name: DomainName,
    class: Class,
    cache_flush: bool,
    ttl: u32,
    data: Record,
}

impl ResourceRecord {
    /// Returns the owner name of the record (its *subject*).
    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    pub fn type_(&self) -> Type {
        self.data.record_type()
    }

    #[inline]
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns whether the record's mDNS cache-flush bit is set.
    #[inline]
    pub fn cache_flush(&self) -> bool {
        self.cache_flush
    }

    /// Returns the entry's Time To Live, in seconds.
    #[inline]
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    #[inline]
    pub fn data(&self) -> &Record {
        &self.data
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name,
            self.ttl,
            self.class,
            self.type_(),
            self.data,
        )
    }
}

/// A question from a DNS query message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    name: DomainName,
    qtype: QType,
    qclass: QClass,
    unicast_response: bool,
}

impl Question {
    /// Returns the domain name that is being queried.
    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    /// Returns the resource record types the client is interested in.
    #[inline]
    pub fn qtype(&self) -> QType {
        self.qtype
    }

    /// Returns the record class that the client is interested in.
    #[inline]
    pub fn qclass(&self) -> QClass {
        self.qclass
    }

    /// Returns whether the querier asked for a unicast response (the mDNS "QU" bit).
    #[inline]
    pub fn unicast_response(&self) -> bool {
        self.unicast_response
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.name, self.qclass, self.qtype)?;
        if self.unicast_response {
            f.write_str("\tQU")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_domain_name() {
        let mut r = Reader::new(b"\x07example\x03com\x00");
        let name = r.read_domain_name().unwrap();
        assert_eq!(name.to_string(), "example.com.");

        let mut r = Reader::new(&[0]);
        let name = r.read_domain_name().unwrap();
        assert_eq!(name.to_string(), ".");
    }

    #[test]
    fn decode_domain_name_pointer() {
        // "_" is never read, then "com.", then "example" + pointer to offset 1
        let mut r = Reader::new(b"_\x03com\x00\x07example\xc0\x01");
        r.pos = 1;
        let name = r.read_domain_name().unwrap();
        assert_eq!(name.to_string(), "com.");
        let name = r.read_domain_name().unwrap();
        assert_eq!(name.to_string(), "example.com.");
        assert_eq!(r.read_u8(), Err(Error::Eof), "should be at EOF");
    }

    #[test]
    fn decode_domain_name_pointer_oob() {
        let mut r = Reader::new(&[0xff, 0xff]);
        assert_eq!(r.read_domain_name(), Err(Error::PointerLoop));
    }

    #[test]
    fn decode_domain_name_dos() {
        // pointer to self
        let mut r = Reader::new(&[0b1100_0000, 0]);
        assert_eq!(r.read_domain_name(), Err(Error::PointerLoop));

        // label, then a pointer back to the start of the same name
        let mut r = Reader::new(&[1, b'a', 0b1100_0000, 0]);
        r.pos = 2;
        assert_eq!(r.read_domain_name(), Err(Error::PointerLoop));
    }

    #[test]
    fn decode_reserved_label_type() {
        let mut r = Reader::new(&[0b0100_0001, b'a', 0]);
        assert_eq!(r.read_domain_name(), Err(Error::InvalidValue));
    }

    #[test]
    fn decode_short_header() {
        assert_eq!(Message::decode(&[0; 11]).unwrap_err(), Error::Eof);
        assert_eq!(Message::decode(&[]).unwrap_err(), Error::Eof);
    }

    #[test]
    fn decode_missing_records() {
        // header claims one answer, but the message ends after the header
        let mut msg = [0; 12];
        msg[7] = 1;
        assert_eq!(Message::decode(&msg).unwrap_err(), Error::Eof);
    }

    #[test]
    fn decode_response() {
        #[rustfmt::skip]
        let msg = [
            0x12, 0x34, 0x84, 0x00, // id, QR + AA
            0, 0, 0, 1, 0, 0, 0, 1, // 0 questions, 1 answer, 0 authority, 1 additional
            // answer: _ipp._tcp.local. PTR x._ipp._tcp.local.
            4, b'_', b'i', b'p', b'p', 4, b'_', b't', b'c', b'p', 5, b'l', b'o', b'c', b'a', b'l', 0,
            0, 12, 0, 1, 0, 0, 0x11, 0x94, 0, 4,
            1, b'x', 0xc0, 12,
            // additional: x._ipp._tcp.local. A 10.0.0.1, cache-flush
            0xc0, 39, 0, 1, 0x80, 1, 0, 0, 0, 120, 0, 4,
            10, 0, 0, 1,
        ];
        let msg = Message::decode(&msg).unwrap();
        assert_eq!(msg.header().id(), 0x1234);
        assert!(msg.header().is_response());
        assert!(msg.questions().is_empty());
        assert!(msg.authority().is_empty());

        let ptr = &msg.answers()[0];
        assert_eq!(ptr.name().to_string(), "_ipp._tcp.local.");
        assert_eq!(ptr.type_(), Type::PTR);
        assert_eq!(ptr.ttl(), 4500);
        assert!(!ptr.cache_flush());
        assert_eq!(ptr.data().to_string(), "x._ipp._tcp.local.");

        let a = &msg.additional()[0];
        assert_eq!(a.name().to_string(), "x._ipp._tcp.local.");
        assert_eq!(a.class(), Class::IN);
        assert!(a.cache_flush());
        assert_eq!(a.to_string(), "x._ipp._tcp.local.\t120\tIN\tA\t10.0.0.1");
    }
}
