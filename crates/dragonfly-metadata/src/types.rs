//! Document types
//!
//! Rendered documents in the layout cloud-init expects. Struct fields are
//! declared in alphabetical order so the serialized YAML is byte-stable.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat metadata document
pub type MetaData = BTreeMap<String, String>;

/// Network configuration document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NetworkData {
    pub links: Vec<LinkEntry>,

    pub networks: Vec<NetworkEntry>,

    pub services: Vec<ServiceEntry>,
}

/// A rendered link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LinkEntry {
    Bond(BondEntry),
    Vlan(VlanEntry),
    Ethernet(EthernetEntry),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EthernetEntry {
    pub ethernet_mac_address: String,

    pub id: String,

    pub mtu: u32,

    #[serde(rename = "type")]
    pub link_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BondEntry {
    pub bond_links: Vec<String>,

    pub bond_mode: String,

    pub ethernet_mac_address: String,

    pub id: String,

    pub mtu: u32,

    /// Always `bond`
    #[serde(rename = "type")]
    pub link_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VlanEntry {
    pub id: String,

    pub mtu: u32,

    /// Always `vlan`
    #[serde(rename = "type")]
    pub link_type: String,

    pub vlan_id: u16,

    pub vlan_link: String,

    pub vlan_mac_address: String,
}

/// A rendered network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NetworkEntry {
    Static(StaticNetworkEntry),
    Dynamic(DynamicNetworkEntry),
}

/// Network with a fixed address (`ipv4` or `ipv6`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticNetworkEntry {
    pub id: String,

    pub ip_address: String,

    pub link: String,

    pub netmask: String,

    pub routes: Vec<RouteEntry>,

    #[serde(rename = "type")]
    pub network_type: String,
}

/// Network configured by DHCP or SLAAC
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DynamicNetworkEntry {
    pub id: String,

    pub link: String,

    pub routes: Vec<RouteEntry>,

    /// `ipv4_dhcp`, `ipv6_dhcp` or `ipv6_slaac`
    #[serde(rename = "type")]
    pub network_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteEntry {
    /// Empty when the route has no gateway
    pub gateway: String,

    pub netmask: String,

    pub network: String,

    pub services: Vec<ServiceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceEntry {
    pub address: String,

    #[serde(rename = "type")]
    pub service_type: String,
}

impl ServiceEntry {
    pub fn dns(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            service_type: "dns".to_string(),
        }
    }
}

/// Address handed out by a pool
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolAddress {
    pub address: String,
    pub prefix: u8,
    pub gateway: Option<String>,
}

impl PoolAddress {
    pub fn new(address: impl Into<String>, prefix: u8) -> Self {
        Self {
            address: address.into(),
            prefix,
            gateway: None,
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }
}

/// Addresses resolved for one request, keyed by pool name.
///
/// Lives for a single reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolCache {
    entries: BTreeMap<String, PoolAddress>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pool: impl Into<String>, address: PoolAddress) {
        self.entries.insert(pool.into(), address);
    }

    /// Resolved address of `pool`; entries with an empty address do not count
    pub fn get(&self, pool: &str) -> Option<&PoolAddress> {
        self.entries.get(pool).filter(|a| !a.address.is_empty())
    }

    pub fn is_resolved(&self, pool: &str) -> bool {
        self.get(pool).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PoolAddress)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Serialize a rendered document to YAML
pub fn to_yaml<T: Serialize>(document: &T) -> Result<String> {
    Ok(serde_yaml::to_string(document)?)
}
