//! Query construction.

use crate::{
    packet::{
        encoder::{MessageEncoder, Question},
        name::DomainName,
        Error, Header, QType,
    },
    Hex,
};

/// Source of transaction IDs for the queries of one run.
///
/// IDs start at a random value and count up, wrapping around. ID 0 is never handed out, because
/// that is what unsolicited mDNS announcements carry; a query with ID 0 could not be told apart
/// from them.
#[derive(Debug, Clone)]
pub struct QueryIds {
    next: u16,
}

impl QueryIds {
    /// Creates an ID source starting at a random ID.
    pub fn new() -> Self {
        Self::starting_at(rand::random())
    }

    /// Creates an ID source whose first ID is `first` (or 1, if `first` is 0).
    pub fn starting_at(first: u16) -> Self {
        Self { next: first }
    }

    /// Returns the next transaction ID.
    pub fn next_id(&mut self) -> u16 {
        if self.next == 0 {
            self.next = 1;
        }
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

impl Default for QueryIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-question mDNS query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    id: u16,
    name: DomainName,
    kind: QType,
}

impl Query {
    /// Creates a query for records of type `kind` at `name`, with a fresh ID from `ids`.
    pub fn new(ids: &mut QueryIds, name: DomainName, kind: QType) -> Self {
        Self {
            id: ids.next_id(),
            name,
            kind,
        }
    }

    /// Returns the transaction ID responses to this query will carry.
    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> QType {
        self.kind
    }

    /// Encodes this query into `buf` and returns the encoded bytes.
    ///
    /// The question has its unicast-response bit set, so responders answer the socket that sent
    /// the query instead of the whole group.
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a [u8], Error> {
        let mut header = Header::default();
        header.set_id(self.id);
        let mut enc = MessageEncoder::new(buf);
        enc.set_header(header);
        enc.question(
            Question::new(&self.name)
                .ty(self.kind)
                .unicast_response(true),
        );
        let len = enc.finish()?;
        let data = &buf[..len];

        log::trace!(
            "encoded query: id={}, name={}, type={}, raw={}",
            self.id,
            self.name,
            self.kind,
            Hex(data),
        );

        Ok(data)
    }
}
