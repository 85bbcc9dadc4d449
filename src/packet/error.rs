use std::fmt;

/// Errors produced while encoding or decoding a DNS message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum Error {
    /// The end of the message was reached while more data was expected.
    Eof,
    /// A domain name pointer pointed into itself or further into the message.
    PointerLoop,
    /// A field was set to an invalid (reserved or illegal) value.
    InvalidValue,
    /// The message does not fit into the buffer it is being encoded into.
    Truncated,
    /// An empty label was encountered where it is not allowed.
    InvalidEmptyLabel,
    /// A label exceeded the maximum allowable length of a label.
    LabelTooLong,
    /// Record data was not fully consumed by the record decoder.
    TrailingData,
}

impl Error {
    fn description(&self) -> &str {
        match self {
            Error::Eof => "unexpected end of data",
            Error::PointerLoop => "encountered domain name pointer loop",
            Error::InvalidValue => "invalid value",
            Error::Truncated => "message does not fit into buffer",
            Error::InvalidEmptyLabel => "invalid empty label",
            Error::LabelTooLong => "label too long",
            Error::TrailingData => "trailing data after record",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl std::error::Error for Error {}
