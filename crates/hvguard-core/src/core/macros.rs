macro_rules! impl_address {
    ($name:ident, $type:ty, $doc:expr) => {
        #[doc = concat!("A ", $doc, ".")]
        #[derive(
            Default,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(pub $type);

        impl $name {
            /// The null address.
            pub const NULL: Self = Self(0);

            #[doc = concat!("Creates a new instance of the `", stringify!($name), "` type.")]
            pub const fn new(value: $type) -> Self {
                Self(value)
            }

            /// Checks if the address is NULL.
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }

            /// Adds a signed displacement, wrapping around the address space.
            pub const fn wrapping_offset(self, displacement: i64) -> Self {
                Self(self.0.wrapping_add_signed(displacement))
            }
        }

        impl From<$type> for $name {
            fn from(value: $type) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $type {
            fn from(value: $name) -> $type {
                value.0
            }
        }

        impl ::std::ops::Add<$type> for $name {
            type Output = $name;

            fn add(self, rhs: $type) -> Self::Output {
                Self(self.0.wrapping_add(rhs))
            }
        }

        impl ::std::ops::AddAssign<$type> for $name {
            fn add_assign(&mut self, rhs: $type) {
                self.0 = self.0.wrapping_add(rhs);
            }
        }

        impl ::std::ops::Sub<$name> for $name {
            type Output = $type;

            fn sub(self, rhs: $name) -> Self::Output {
                self.0.wrapping_sub(rhs.0)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "0x{:016x}", self.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "0x{:016x}", self.0)
            }
        }

        impl ::std::fmt::LowerHex for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                ::std::fmt::LowerHex::fmt(&self.0, f)
            }
        }
    };
}

pub(crate) use impl_address;
