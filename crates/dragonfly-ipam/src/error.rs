//! Error types for address arithmetic

use thiserror::Error;

/// Error type for address computations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The range cannot be used as given
    #[error("invalid pool range: {0}")]
    InvalidPoolSpec(String),

    /// The computed address is past the end of the range or outside its subnet
    #[error("IP address {address} out of bounds of {bound}")]
    OutOfRange { address: String, bound: String },

    /// The computed address does not fit the family's width
    #[error("IP address overflow for {base} at offset {offset}")]
    AddressOverflow { base: String, offset: i64 },

    /// An IPv6 result that would read back as an IPv4 address
    #[error("IP address {0} is an IPv4-mapped IPv6 address")]
    AmbiguousFamily(String),

    /// Prefix length larger than the family allows
    #[error("invalid prefix length {prefix} for {family}")]
    InvalidPrefix { prefix: u8, family: &'static str },
}

/// Result type for address computations
pub type Result<T> = std::result::Result<T, AddressError>;
