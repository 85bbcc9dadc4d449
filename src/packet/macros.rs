/// Declares a transparent newtype over a wire integer, with named constants for the known values.
///
/// Unlike a Rust `enum`, every bit pattern is a valid value, so decoding never has to reject an
/// unknown code.
macro_rules! ffi_enum {
    (
        $( #[$attrs:meta] )*
        $v:vis enum $name:ident: $native:ty {
            $(
                $( #[$variant_attrs:meta] )*
                $variant:ident = $value:expr
            ),+
            $(,)?
        }
    ) => {
        $( #[$attrs] )*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
        #[repr(transparent)]
        $v struct $name(pub(crate) $native);

        impl $name {
            $(
                $( #[$variant_attrs] )*
                $v const $variant: Self = Self($value);
            )+
        }

        impl From<$native> for $name {
            #[inline]
            fn from(raw: $native) -> Self {
                Self(raw)
            }
        }

        #[allow(unreachable_patterns)]
        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match *self {
                    $(
                        Self::$variant => f.write_str(stringify!($variant)),
                    )+

                    _ => write!(f, "(unknown {}: {:#x})", stringify!($name), self.0),
                }
            }
        }
    };
}
