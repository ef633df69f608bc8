//! Newtype generation macros

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

macro_rules! u8_newtype {
    ($name:ident, $error:ident, $min: expr, $max:expr) => {
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ::serde::Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(u8);

        #[allow(dead_code)]
        impl $name {
            pub const MIN: Self = Self($min);
            pub const MAX: Self = Self($max);

            #[allow(unused_comparisons)]
            pub const fn new_clamped(value: u8) -> Self {
                if value < $min {
                    Self($min)
                } else if value > $max {
                    Self($max)
                } else {
                    Self(value)
                }
            }

            pub const fn as_u8(&self) -> u8 {
                self.0
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ValueError;

            #[allow(unused_comparisons, clippy::manual_range_contains)]
            fn try_from(value: u8) -> Result<Self, Self::Error> {
                if value >= $min && value <= $max {
                    Ok(Self(value))
                } else {
                    Err(ValueError::$error(value))
                }
            }
        }
    };
}

pub(crate) use u8_newtype;
