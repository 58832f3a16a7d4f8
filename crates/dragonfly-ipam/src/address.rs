//! Address arithmetic inside a pool range

use crate::error::{AddressError, Result};
use dragonfly_crd::AddressRange;
use ipnetwork::IpNetwork;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family, which fixes the integer width of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Width of an address in bytes
    pub const fn width(self) -> usize {
        match self {
            AddressFamily::V4 => 4,
            AddressFamily::V6 => 16,
        }
    }

    /// Largest representable address value
    pub const fn max_value(self) -> u128 {
        match self {
            AddressFamily::V4 => u32::MAX as u128,
            AddressFamily::V6 => u128::MAX,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AddressFamily::V4 => "IPv4",
            AddressFamily::V6 => "IPv6",
        }
    }
}

/// An address as an unsigned integer of its family's width
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WideAddr {
    family: AddressFamily,
    value: u128,
}

impl WideAddr {
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn value(&self) -> u128 {
        self.value
    }

    /// Add a signed offset.
    ///
    /// Returns `None` when the sum leaves `[0, family max]`.
    pub fn checked_add(self, offset: i64) -> Option<Self> {
        let value = self.value.checked_add_signed(i128::from(offset))?;
        (value <= self.family.max_value()).then_some(Self {
            family: self.family,
            value,
        })
    }

    /// Convert back to an address of the same family.
    ///
    /// IPv6 values inside `::ffff:0:0/96` are refused: they print as IPv4
    /// addresses and would change family when read back.
    pub fn to_ip(self) -> Result<IpAddr> {
        match self.family {
            AddressFamily::V4 => {
                let bits = u32::try_from(self.value).map_err(|_| AddressError::AddressOverflow {
                    base: self.value.to_string(),
                    offset: 0,
                })?;
                Ok(IpAddr::V4(Ipv4Addr::from(bits)))
            }
            AddressFamily::V6 => {
                let addr = Ipv6Addr::from(self.value);
                if addr.to_ipv4_mapped().is_some() {
                    return Err(AddressError::AmbiguousFamily(addr.to_string()));
                }
                Ok(IpAddr::V6(addr))
            }
        }
    }
}

impl From<IpAddr> for WideAddr {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self {
                family: AddressFamily::V4,
                value: u128::from(u32::from(v4)),
            },
            IpAddr::V6(v6) => Self {
                family: AddressFamily::V6,
                value: u128::from(v6),
            },
        }
    }
}

impl fmt::Display for WideAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            AddressFamily::V4 => write!(f, "{}", Ipv4Addr::from(self.value as u32)),
            AddressFamily::V6 => write!(f, "{}", Ipv6Addr::from(self.value)),
        }
    }
}

/// A parsed and family-checked [`AddressRange`]
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRange {
    start: Option<IpAddr>,
    end: Option<IpAddr>,
    subnet: Option<IpNetwork>,
}

impl PoolRange {
    /// Parse a range, checking that every bound belongs to one family
    pub fn parse(range: &AddressRange) -> Result<Self> {
        let start = parse_addr("start", range.start.as_deref())?;
        let end = parse_addr("end", range.end.as_deref())?;
        let subnet = match range.subnet.as_deref() {
            Some(cidr) => Some(IpNetwork::from_str(cidr).map_err(|e| {
                AddressError::InvalidPoolSpec(format!("subnet '{}': {}", cidr, e))
            })?),
            None => None,
        };

        let family = match (&start, &subnet) {
            (Some(ip), _) => AddressFamily::of(ip),
            (None, Some(net)) => AddressFamily::of(&net.ip()),
            (None, None) => {
                return Err(AddressError::InvalidPoolSpec(
                    "either start or subnet is required".to_string(),
                ))
            }
        };

        if let Some(end) = &end {
            if AddressFamily::of(end) != family {
                return Err(AddressError::InvalidPoolSpec(format!(
                    "end {} is not {}",
                    end,
                    family.name()
                )));
            }
        }
        if let Some(net) = &subnet {
            if AddressFamily::of(&net.ip()) != family {
                return Err(AddressError::InvalidPoolSpec(format!(
                    "subnet {} is not {}",
                    net,
                    family.name()
                )));
            }
        }

        Ok(Self { start, end, subnet })
    }

    /// Address at `offset` from the start of the range.
    ///
    /// Without a start, the range begins one past the subnet's network
    /// address.
    pub fn address_at(&self, offset: i64) -> Result<IpAddr> {
        let (base, offset) = match (self.start, &self.subnet) {
            (Some(start), _) => (start, offset),
            (None, Some(net)) => {
                let base = net.network();
                let offset = offset.checked_add(1).ok_or(AddressError::AddressOverflow {
                    base: base.to_string(),
                    offset,
                })?;
                (base, offset)
            }
            (None, None) => {
                return Err(AddressError::InvalidPoolSpec(
                    "either start or subnet is required".to_string(),
                ))
            }
        };

        let wide = WideAddr::from(base)
            .checked_add(offset)
            .ok_or_else(|| AddressError::AddressOverflow {
                base: base.to_string(),
                offset,
            })?;

        if let Some(end) = self.end {
            if wide > WideAddr::from(end) {
                return Err(AddressError::OutOfRange {
                    address: wide.to_string(),
                    bound: end.to_string(),
                });
            }
        }

        let ip = wide.to_ip()?;

        if let Some(net) = &self.subnet {
            if !net.contains(ip) {
                return Err(AddressError::OutOfRange {
                    address: ip.to_string(),
                    bound: net.to_string(),
                });
            }
        }

        Ok(ip)
    }
}

fn parse_addr(field: &str, value: Option<&str>) -> Result<Option<IpAddr>> {
    value
        .map(|s| {
            IpAddr::from_str(s).map_err(|_| {
                AddressError::InvalidPoolSpec(format!("{} '{}' is not an IP address", field, s))
            })
        })
        .transpose()
}

/// Address at `offset` inside `range`.
///
/// With a start, the result is `start + offset`, which must not pass `end`
/// and must lie in `subnet` when those are set. Without a start, the result
/// is `network(subnet) + 1 + offset` and must lie in the subnet.
pub fn compute_address(range: &AddressRange, offset: i64) -> Result<IpAddr> {
    PoolRange::parse(range)?.address_at(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(range: &AddressRange, offset: i64) -> String {
        compute_address(range, offset).unwrap().to_string()
    }

    #[test]
    fn test_start_plus_offset_within_end() {
        let range = AddressRange::from_start("10.0.0.10").with_end("10.0.0.20");
        for offset in 0..=10 {
            assert_eq!(addr(&range, offset), format!("10.0.0.{}", 10 + offset));
        }
    }

    #[test]
    fn test_offset_carries_across_octets() {
        let range = AddressRange::from_start("10.0.0.255");
        assert_eq!(addr(&range, 1), "10.0.1.0");
        assert_eq!(addr(&range, 257), "10.0.2.0");
    }

    #[test]
    fn test_negative_offset() {
        let range = AddressRange::from_start("10.0.0.10");
        assert_eq!(addr(&range, -5), "10.0.0.5");
    }

    #[test]
    fn test_ipv6_start() {
        let range = AddressRange::from_start("2001:db8::10").with_end("2001:db8::ff");
        assert_eq!(addr(&range, 5), "2001:db8::15");
        assert_eq!(addr(&range, 0xef), "2001:db8::ff");
    }

    #[test]
    fn test_subnet_only_skips_network_address() {
        assert_eq!(addr(&AddressRange::from_subnet("192.168.0.0/24"), 0), "192.168.0.1");
        assert_eq!(addr(&AddressRange::from_subnet("192.168.0.0/24"), 254), "192.168.0.255");
        assert_eq!(addr(&AddressRange::from_subnet("2001:db8::/64"), 0), "2001:db8::1");
        // host bits in the CIDR are ignored
        assert_eq!(addr(&AddressRange::from_subnet("192.168.0.17/24"), 0), "192.168.0.1");
    }

    #[test]
    fn test_past_end_is_out_of_range() {
        let range = AddressRange::from_start("10.0.0.10").with_end("10.0.0.20");
        assert_eq!(
            compute_address(&range, 11),
            Err(AddressError::OutOfRange {
                address: "10.0.0.21".to_string(),
                bound: "10.0.0.20".to_string(),
            })
        );
    }

    #[test]
    fn test_outside_subnet_is_out_of_range() {
        let range = AddressRange::from_subnet("192.168.0.0/24");
        assert!(matches!(
            compute_address(&range, 255),
            Err(AddressError::OutOfRange { .. })
        ));

        let range = AddressRange::from_start("192.168.0.250").with_subnet("192.168.0.0/24");
        assert_eq!(addr(&range, 5), "192.168.0.255");
        assert!(matches!(
            compute_address(&range, 6),
            Err(AddressError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_ipv4_overflow() {
        let range = AddressRange::from_start("255.255.255.250");
        assert_eq!(addr(&range, 5), "255.255.255.255");
        assert_eq!(
            compute_address(&range, 6),
            Err(AddressError::AddressOverflow {
                base: "255.255.255.250".to_string(),
                offset: 6,
            })
        );
    }

    #[test]
    fn test_ipv4_underflow() {
        let range = AddressRange::from_start("0.0.0.0");
        assert!(matches!(
            compute_address(&range, -1),
            Err(AddressError::AddressOverflow { .. })
        ));
    }

    #[test]
    fn test_ipv6_overflow() {
        let range = AddressRange::from_start("ffff:ffff:ffff:ffff:ffff:ffff:ffff:fffe");
        assert_eq!(addr(&range, 1), "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff");
        assert!(matches!(
            compute_address(&range, 2),
            Err(AddressError::AddressOverflow { .. })
        ));
    }

    #[test]
    fn test_ipv4_mapped_results_are_refused() {
        let range = AddressRange::from_start("::ffff:10.0.0.1");
        assert!(matches!(
            compute_address(&range, 0),
            Err(AddressError::AmbiguousFamily(_))
        ));

        let range = AddressRange::from_start("::fffe:ffff:ffff");
        assert!(matches!(
            compute_address(&range, 1),
            Err(AddressError::AmbiguousFamily(_))
        ));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            compute_address(&AddressRange::default(), 0),
            Err(AddressError::InvalidPoolSpec(_))
        ));
        assert!(matches!(
            compute_address(&AddressRange::from_start("10.0.0.300"), 0),
            Err(AddressError::InvalidPoolSpec(_))
        ));
        assert!(matches!(
            compute_address(&AddressRange::from_subnet("10.0.0.0/33"), 0),
            Err(AddressError::InvalidPoolSpec(_))
        ));
        assert!(matches!(
            compute_address(&AddressRange::from_start("10.0.0.1").with_end("2001:db8::1"), 0),
            Err(AddressError::InvalidPoolSpec(_))
        ));
        assert!(matches!(
            compute_address(&AddressRange::from_start("10.0.0.1").with_subnet("2001:db8::/64"), 0),
            Err(AddressError::InvalidPoolSpec(_))
        ));
    }

    #[test]
    fn test_wide_addr_widths() {
        let v4 = WideAddr::from(IpAddr::from_str("10.0.0.1").unwrap());
        let v6 = WideAddr::from(IpAddr::from_str("2001:db8::1").unwrap());
        assert_eq!(v4.family().width(), 4);
        assert_eq!(v6.family().width(), 16);
        assert_eq!(v4.value(), 0x0a00_0001);
        assert_eq!(v4.checked_add(1).unwrap().to_string(), "10.0.0.2");
    }
}
