//! Prefix length to netmask translation

use crate::error::{AddressError, Result};
use ipnetwork::{Ipv4Network, Ipv6Network};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Netmask for a prefix length, e.g. `24` gives `255.255.255.0`.
///
/// IPv6 masks display in compressed form (`64` gives `ffff:ffff:ffff:ffff::`).
pub fn mask_for(prefix: u8, is_v4: bool) -> Result<IpAddr> {
    if is_v4 {
        let net = Ipv4Network::new(Ipv4Addr::UNSPECIFIED, prefix).map_err(|_| {
            AddressError::InvalidPrefix {
                prefix,
                family: "IPv4",
            }
        })?;
        Ok(IpAddr::V4(net.mask()))
    } else {
        let net = Ipv6Network::new(Ipv6Addr::UNSPECIFIED, prefix).map_err(|_| {
            AddressError::InvalidPrefix {
                prefix,
                family: "IPv6",
            }
        })?;
        Ok(IpAddr::V6(net.mask()))
    }
}
