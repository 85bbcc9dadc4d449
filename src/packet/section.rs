//! Marker types for the sections of a DNS message.
//!
//! [`MessageEncoder`](super::encoder::MessageEncoder) carries one of these as a type parameter so
//! that records can only be appended in wire order.

mod sealed {
    pub trait Sealed: 'static {}
}

/// Trait implemented by the DNS section types.
pub trait Section: sealed::Sealed {}

macro_rules! sections {
    ($( $(#[$attr:meta])* $name:ident ),+ $(,)?) => {
        $(
            $(#[$attr])*
            pub enum $name {}
            impl sealed::Sealed for $name {}
            impl Section for $name {}
        )+
    };
}

sections! {
    /// The *Question* section.
    Question,
    /// The *Answer* section.
    Answer,
    /// The *Authority* section.
    Authority,
    /// The *Additional Records* section.
    Additional,
}
