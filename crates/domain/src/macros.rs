//! Macro for implementing Display and FromStr for closed string enums
//!
//! Error kinds, protocols, and similar closed sets travel as fixed strings in
//! envelopes, configuration files, and environment variables. This macro
//! keeps the string table in one place for both directions.
//!
//! # Example
//!
//! ```rust
//! use repolink_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Scheme {
//!     Basic,
//!     OAuth,
//!     ServiceAccount,
//! }
//!
//! impl_domain_status_conversions!(Scheme {
//!     Basic => "basic",
//!     OAuth => "oauth",
//!     ServiceAccount => "service-account",
//! });
//!
//! assert_eq!(Scheme::ServiceAccount.to_string(), "service-account");
//! assert_eq!("OAUTH".parse::<Scheme>().unwrap(), Scheme::OAuth);
//! ```

/// Implements Display and FromStr traits for closed string enums
///
/// This macro generates:
/// - Display trait: writes the mapped string for each variant
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase string
///   representations
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
