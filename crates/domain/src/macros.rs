//! Macro for implementing Display and FromStr for persisted string enums
//!
//! Several domain enums are stored as text columns. This macro provides a
//! single implementation for both Display and FromStr so that the column
//! representation is defined in exactly one place.
//!
//! # Example
//!
//! ```rust
//! use cadence_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Frequency {
//!     Daily,
//!     Weekly,
//! }
//!
//! impl_domain_status_conversions!(Frequency {
//!     Daily => "daily",
//!     Weekly => "weekly",
//! });
//!
//! assert_eq!("WEEKLY".parse::<Frequency>().unwrap(), Frequency::Weekly);
//! ```

/// Implements Display and FromStr traits for text-backed enums
///
/// This macro generates:
/// - Display trait: writes the column representation
/// - FromStr trait: parses case-insensitive, whitespace-trimmed strings and
///   reports unknown values as [`crate::CadenceError::InvalidInput`]
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase string
///   representations
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Column representation of this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::CadenceError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::CadenceError::InvalidInput(format!(
                        "Invalid {}: {}",
                        stringify!($enum_name),
                        s
                    ))),
                }
            }
        }
    };
}
