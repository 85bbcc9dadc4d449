use std::{fmt, io};

use crate::packet;

/// Errors that abort a browsing run.
///
/// Malformed datagrams are not represented here: they are logged and skipped, so that a single
/// bad packet cannot end the run.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A query could not be encoded.
    Encoding(packet::Error),
    /// Sending, receiving or writing output failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Encoding(e) => write!(f, "failed to encode query: {e}"),
            Error::Io(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Encoding(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<packet::Error> for Error {
    fn from(e: packet::Error) -> Self {
        Error::Encoding(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
