//! Dragonfly IPAM helpers
//!
//! Pure address arithmetic used when rendering boot data:
//!
//! - [`compute_address`] - the address at an offset inside a pool range,
//!   checked against the range's end and subnet
//! - [`mask_for`] - a prefix length rendered as a netmask
//!
//! Addresses are handled as fixed-width unsigned integers ([`WideAddr`]),
//! four bytes for IPv4 and sixteen for IPv6, so both families share the same
//! checked arithmetic.
//!
//! # Example
//!
//! ```
//! use dragonfly_crd::AddressRange;
//! use dragonfly_ipam::{compute_address, mask_for};
//!
//! let range = AddressRange::from_subnet("192.168.0.0/24");
//! assert_eq!(compute_address(&range, 0).unwrap().to_string(), "192.168.0.1");
//! assert_eq!(mask_for(24, true).unwrap().to_string(), "255.255.255.0");
//! ```

pub mod address;
pub mod error;
pub mod mask;

pub use address::{compute_address, AddressFamily, PoolRange, WideAddr};
pub use error::{AddressError, Result};
pub use mask::mask_for;
