//! DataTemplate CRD types
//!
//! A DataTemplate describes, with symbolic rules, the cloud-init metadata
//! and network data a machine should boot with. Rules refer to IP pools,
//! host interfaces and node objects; they are resolved per machine when a
//! [`DataRequest`](crate::DataRequest) is reconciled.

use crate::{AddressRange, CrdError, ObjectMeta, Result, TypeMeta};
use serde::{Deserialize, Serialize};

/// Template resource for boot-time metadata and network data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataTemplate {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata (name, namespace, labels, etc.)
    pub metadata: ObjectMeta,

    /// Template specification
    pub spec: DataTemplateSpec,
}

impl DataTemplate {
    /// Create a new, empty DataTemplate
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::data_template(),
            metadata: ObjectMeta::new(name),
            spec: DataTemplateSpec::default(),
        }
    }

    /// Set the metadata section
    pub fn with_meta_data(mut self, meta_data: MetaDataTemplate) -> Self {
        self.spec.meta_data = Some(meta_data);
        self
    }

    /// Set the network data section
    pub fn with_network_data(mut self, network_data: NetworkDataTemplate) -> Self {
        self.spec.network_data = Some(network_data);
        self
    }

    /// Whether the template produces any document at all
    pub fn has_sections(&self) -> bool {
        self.spec.meta_data.is_some() || self.spec.network_data.is_some()
    }

    /// Names of every pool the template references, in traversal order.
    ///
    /// The order is: metadata address, prefix and gateway rules; static IPv4
    /// networks (pool, then route gateways); static IPv6 networks; then the
    /// route gateways of DHCP and SLAAC networks. Each pool appears once, at
    /// its first reference.
    pub fn pool_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();

        fn add<'a>(refs: &mut Vec<&'a str>, name: &'a str) {
            if !refs.contains(&name) {
                refs.push(name);
            }
        }

        if let Some(meta) = &self.spec.meta_data {
            for rule in &meta.ip_addresses_from_pool {
                add(&mut refs, &rule.name);
            }
            for rule in &meta.prefixes_from_pool {
                add(&mut refs, &rule.name);
            }
            for rule in &meta.gateways_from_pool {
                add(&mut refs, &rule.name);
            }
        }

        if let Some(network) = &self.spec.network_data {
            let networks = &network.networks;
            for net in networks.ipv4.iter().chain(&networks.ipv6) {
                add(&mut refs, &net.ip_address_from_ip_pool);
                for pool in net.routes.iter().filter_map(Route::gateway_pool) {
                    add(&mut refs, pool);
                }
            }
            for net in networks
                .ipv4_dhcp
                .iter()
                .chain(&networks.ipv6_dhcp)
                .chain(&networks.ipv6_slaac)
            {
                for pool in net.routes.iter().filter_map(Route::gateway_pool) {
                    add(&mut refs, pool);
                }
            }
        }

        refs
    }

    /// Validate the template
    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.is_empty() {
            return Err(CrdError::MissingField("metadata.name".to_string()));
        }

        if let Some(meta) = &self.spec.meta_data {
            let pool_rules = meta
                .ip_addresses_from_pool
                .iter()
                .chain(&meta.prefixes_from_pool)
                .chain(&meta.gateways_from_pool);
            for (i, rule) in pool_rules.enumerate() {
                if rule.name.is_empty() {
                    return Err(CrdError::InvalidFieldValue {
                        field: format!("spec.metaData pool rule [{}]", i),
                        message: "pool name is empty".to_string(),
                    });
                }
            }
        }

        if let Some(network) = &self.spec.network_data {
            let networks = &network.networks;
            for (i, net) in networks.ipv4.iter().chain(&networks.ipv6).enumerate() {
                if net.ip_address_from_ip_pool.is_empty() {
                    return Err(CrdError::InvalidFieldValue {
                        field: format!("spec.networkData.networks[{}]", i),
                        message: "ipAddressFromIPPool is empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// DataTemplate specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataTemplateSpec {
    /// Rules producing the flat metadata document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<MetaDataTemplate>,

    /// Links, networks and services of the network data document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_data: Option<NetworkDataTemplate>,
}

/// Rules for the metadata document.
///
/// Every rule writes one string value under its `key`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetaDataTemplate {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strings: Vec<MetaDataString>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub object_names: Vec<MetaDataObjectName>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<MetaDataIndex>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<MetaDataNamespace>,

    /// Static addresses derived from a range and the request index
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<MetaDataIpAddress>,

    #[serde(
        default,
        rename = "ipAddressesFromIPPool",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ip_addresses_from_pool: Vec<MetaDataFromPool>,

    #[serde(
        default,
        rename = "prefixesFromIPPool",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub prefixes_from_pool: Vec<MetaDataFromPool>,

    #[serde(
        default,
        rename = "gatewaysFromIPPool",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub gateways_from_pool: Vec<MetaDataFromPool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_host_interfaces: Vec<MetaDataHostInterface>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_labels: Vec<MetaDataFromLabel>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_annotations: Vec<MetaDataFromAnnotation>,
}

/// Literal value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDataString {
    pub key: String,
    pub value: String,
}

/// Name of a node object (`machine`, `infraMachine` or `host`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDataObjectName {
    pub key: String,
    pub object: String,
}

/// `prefix + (offset + index * step) + suffix`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MetaDataIndex {
    pub key: String,

    #[serde(default)]
    pub offset: i64,

    /// Zero is treated as one
    #[serde(default)]
    pub step: i64,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub suffix: String,
}

/// Namespace of the request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDataNamespace {
    pub key: String,
}

/// Address computed from a range at offset `index * step`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDataIpAddress {
    pub key: String,

    #[serde(flatten)]
    pub range: AddressRange,

    /// Zero is treated as one
    #[serde(default)]
    pub step: i64,
}

/// Address, prefix or gateway handed out by the named pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDataFromPool {
    pub key: String,
    pub name: String,
}

/// MAC address of the named host interface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDataHostInterface {
    pub key: String,
    pub interface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDataFromLabel {
    pub key: String,
    pub object: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaDataFromAnnotation {
    pub key: String,
    pub object: String,
    pub annotation: String,
}

/// Network data template (OpenStack network_data.json layout)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDataTemplate {
    #[serde(default)]
    pub links: NetworkLinks,

    #[serde(default)]
    pub networks: NetworkNetworks,

    #[serde(default)]
    pub services: NetworkServices,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLinks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ethernets: Vec<EthernetLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bonds: Vec<BondLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlans: Vec<VlanLink>,
}

/// Where a link's MAC address comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum MacAddressSource {
    /// Literal MAC address
    String(String),
    /// MAC of the host NIC with this name
    FromHostInterface(String),
}

fn default_mtu() -> u32 {
    1500
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EthernetLink {
    /// Link type as understood by cloud-init (`phy`, `tap`, ...)
    #[serde(rename = "type")]
    pub link_type: String,

    pub id: String,

    #[serde(default = "default_mtu")]
    pub mtu: u32,

    pub mac_address: MacAddressSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BondLink {
    pub id: String,

    #[serde(default = "default_mtu")]
    pub mtu: u32,

    pub mac_address: MacAddressSource,

    pub bond_mode: String,

    #[serde(default)]
    pub bond_links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VlanLink {
    pub id: String,

    #[serde(default = "default_mtu")]
    pub mtu: u32,

    pub mac_address: MacAddressSource,

    #[serde(rename = "vlanID")]
    pub vlan_id: u16,

    pub vlan_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NetworkNetworks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv4: Vec<StaticNetwork>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv6: Vec<StaticNetwork>,

    #[serde(default, rename = "ipv4DHCP", skip_serializing_if = "Vec::is_empty")]
    pub ipv4_dhcp: Vec<DynamicNetwork>,

    #[serde(default, rename = "ipv6DHCP", skip_serializing_if = "Vec::is_empty")]
    pub ipv6_dhcp: Vec<DynamicNetwork>,

    #[serde(default, rename = "ipv6SLAAC", skip_serializing_if = "Vec::is_empty")]
    pub ipv6_slaac: Vec<DynamicNetwork>,
}

/// Network with an address taken from a pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticNetwork {
    pub id: String,

    pub link: String,

    #[serde(rename = "ipAddressFromIPPool")]
    pub ip_address_from_ip_pool: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

/// DHCP or SLAAC network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicNetwork {
    pub id: String,

    pub link: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub network: String,

    pub prefix: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<RouteGateway>,

    #[serde(default)]
    pub services: NetworkServices,
}

impl Route {
    /// Pool supplying the gateway, if any
    pub fn gateway_pool(&self) -> Option<&str> {
        match &self.gateway {
            Some(RouteGateway::FromIpPool(pool)) => Some(pool),
            _ => None,
        }
    }
}

/// Where a route's gateway comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RouteGateway {
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "fromIPPool")]
    FromIpPool(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NetworkServices {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
}
