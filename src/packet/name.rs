//! Domain names and labels.

use std::{
    borrow::Cow,
    fmt::{self, Write},
    slice,
    str::FromStr,
};

use super::Error;

/// A `.`-separated component of a [`DomainName`].
///
/// Labels consist of arbitrary bytes and have a maximum length of 63 bytes. This type can only
/// represent non-empty labels, so the minimum length is 1 byte.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    // Guaranteed to contain >0 and at most `Label::MAX_LEN` bytes.
    bytes: Box<[u8]>,
}

impl Label {
    /// The maximum length of a domain label.
    pub const MAX_LEN: usize = 0b0011_1111;

    /// Creates a [`Label`] from raw bytes or a string slice, returning an error if the bytes are
    /// an invalid label.
    pub fn try_new(label: impl AsRef<[u8]>) -> Result<Self, Error> {
        let label = label.as_ref();
        if label.is_empty() {
            return Err(Error::InvalidEmptyLabel);
        }

        if label.len() > Self::MAX_LEN {
            return Err(Error::LabelTooLong);
        }

        Ok(Self {
            bytes: label.into(),
        })
    }

    /// Returns the raw bytes of this label.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Interprets the label as UTF-8, replacing invalid sequences.
    ///
    /// DNS-SD instance names are UTF-8 (RFC 6763 section 4.1.1), so this is the right way to show
    /// them to a user. [`Display`](fmt::Display) escapes everything outside printable ASCII.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#""{}""#, self.as_bytes().escape_ascii())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_bytes().escape_ascii(), f)
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}

/// A fully qualified domain name, represented as a list of [`Label`]s.
///
/// On the wire, domain names are terminated by an empty label; this type omits it. Displaying a
/// [`DomainName`] always includes the trailing `.`.
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct DomainName {
    // Does not include the trailing empty label.
    labels: Vec<Label>,
}

impl DomainName {
    /// The empty root domain `.`.
    pub const ROOT: Self = Self { labels: Vec::new() };

    /// Maximum encoded length of a domain name, including length bytes and the root label.
    pub const MAX_ENCODED_LEN: usize = 255;

    /// Parses a domain name as a string of `.`-separated labels.
    ///
    /// A trailing `.` is allowed but not required.
    ///
    /// The [`FromStr`] implementation performs the same operation. This method is just a
    /// convenience function so that you don't have to import that trait.
    pub fn from_str(s: &str) -> Result<Self, Error> {
        s.parse()
    }

    /// Returns the `.`-separated labels making up this domain name.
    ///
    /// The trailing empty label is not included.
    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Appends a [`Label`] to the end of this domain name.
    #[inline]
    pub fn push_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    /// Returns the number of bytes this name occupies on the wire, without compression.
    pub fn encoded_len(&self) -> usize {
        self.labels.iter().map(|l| l.as_bytes().len() + 1).sum::<usize>() + 1
    }

    /// If `suffix` is a *proper* suffix of `self`, returns the labels that precede it.
    ///
    /// Returns [`None`] if `self` does not end with `suffix`, or if both names are equal.
    pub fn strip_suffix(&self, suffix: &DomainName) -> Option<&[Label]> {
        if self.labels.len() <= suffix.labels.len() || !self.labels.ends_with(&suffix.labels) {
            return None;
        }
        Some(&self.labels[..self.labels.len() - suffix.labels.len()])
    }
}

impl<'a> IntoIterator for &'a DomainName {
    type Item = &'a Label;
    type IntoIter = slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

impl FromIterator<Label> for DomainName {
    fn from_iter<T: IntoIterator<Item = Label>>(iter: T) -> Self {
        Self {
            labels: Vec::from_iter(iter),
        }
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#""{}""#, self)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return f.write_char('.');
        }
        for label in &self.labels {
            fmt::Display::fmt(label, f)?;
            f.write_char('.')?;
        }
        Ok(())
    }
}

impl FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "." {
            // `split_terminator` returns an empty label for this, so special-case it
            return Ok(Self::ROOT);
        }

        let name = s
            .split_terminator('.')
            .map(str::parse)
            .collect::<Result<DomainName, _>>()?;
        if name.encoded_len() > Self::MAX_ENCODED_LEN {
            return Err(Error::InvalidValue);
        }
        Ok(name)
    }
}
