//! Template rendering
//!
//! Turns a [`DataTemplate`] into the two documents a machine boots with:
//!
//! - the metadata document, a flat map of keys to strings
//! - the network data document, with `links`, `networks` and `services`
//!
//! Rendering is pure. Pool addresses must already be resolved into a
//! [`PoolCache`]; node objects are passed in through [`NodeAttributes`].

use crate::error::{RenderError, Result};
use crate::types::{
    to_yaml, BondEntry, DynamicNetworkEntry, EthernetEntry, LinkEntry, MetaData, NetworkData,
    NetworkEntry, PoolAddress, PoolCache, RouteEntry, ServiceEntry, StaticNetworkEntry, VlanEntry,
};
use dragonfly_crd::{
    DataRequest, DataTemplate, DynamicNetwork, Host, InfraMachine, MacAddressSource, Machine,
    MetaDataTemplate, NetworkDataTemplate, NetworkLinks, NetworkNetworks, NetworkServices,
    ObjectMeta, Route, RouteGateway, StaticNetwork,
};
use dragonfly_ipam::{compute_address, mask_for, AddressError};
use std::str::FromStr;

/// Object a metadata rule reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Machine,
    InfraMachine,
    Host,
}

impl FromStr for ObjectKind {
    type Err = RenderError;

    /// Case-insensitive; `metal3machine` and `baremetalhost` are accepted
    /// for older templates.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "machine" => Ok(ObjectKind::Machine),
            "inframachine" | "metal3machine" => Ok(ObjectKind::InfraMachine),
            "host" | "baremetalhost" => Ok(ObjectKind::Host),
            _ => Err(RenderError::UnknownObjectKind(s.to_string())),
        }
    }
}

/// Node objects the metadata rules read from
#[derive(Debug, Clone, Copy)]
pub struct NodeAttributes<'a> {
    pub infra_machine: &'a InfraMachine,
    pub machine: &'a Machine,
    pub host: &'a Host,
}

impl<'a> NodeAttributes<'a> {
    pub fn new(infra_machine: &'a InfraMachine, machine: &'a Machine, host: &'a Host) -> Self {
        Self {
            infra_machine,
            machine,
            host,
        }
    }

    fn meta(&self, kind: ObjectKind) -> &'a ObjectMeta {
        match kind {
            ObjectKind::Machine => &self.machine.metadata,
            ObjectKind::InfraMachine => &self.infra_machine.metadata,
            ObjectKind::Host => &self.host.metadata,
        }
    }

    fn object(&self, selector: &str) -> Result<&'a ObjectMeta> {
        Ok(self.meta(selector.parse()?))
    }
}

/// Both documents as YAML. A section missing from the template leaves its
/// document unset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedDocuments {
    pub meta_data: Option<String>,
    pub network_data: Option<String>,
}

/// Render every section of `template`
pub fn render(
    request: &DataRequest,
    template: &DataTemplate,
    pools: &PoolCache,
    node: &NodeAttributes<'_>,
) -> Result<RenderedDocuments> {
    let meta_data = template
        .spec
        .meta_data
        .as_ref()
        .map(|section| render_meta_data(request, section, pools, node).and_then(|d| to_yaml(&d)))
        .transpose()?;

    let network_data = template
        .spec
        .network_data
        .as_ref()
        .map(|section| render_network_data(section, pools, node.host).and_then(|d| to_yaml(&d)))
        .transpose()?;

    Ok(RenderedDocuments {
        meta_data,
        network_data,
    })
}

/// Render the metadata document.
///
/// Rule kinds are applied in a fixed order and a later rule overwrites an
/// earlier one writing the same key.
pub fn render_meta_data(
    request: &DataRequest,
    template: &MetaDataTemplate,
    pools: &PoolCache,
    node: &NodeAttributes<'_>,
) -> Result<MetaData> {
    let mut meta = MetaData::new();
    let index = request.spec.index;

    for rule in &template.from_host_interfaces {
        meta.insert(rule.key.clone(), host_mac(node.host, &rule.interface)?.to_string());
    }

    for rule in &template.ip_addresses_from_pool {
        meta.insert(rule.key.clone(), pool_address(pools, &rule.name)?.address.clone());
    }

    for rule in &template.prefixes_from_pool {
        meta.insert(rule.key.clone(), pool_address(pools, &rule.name)?.prefix.to_string());
    }

    for rule in &template.gateways_from_pool {
        let gateway = pool_address(pools, &rule.name)?.gateway.clone();
        meta.insert(rule.key.clone(), gateway.unwrap_or_default());
    }

    for rule in &template.ip_addresses {
        let step = if rule.step == 0 { 1 } else { rule.step };
        let offset = index.checked_mul(step).ok_or_else(|| AddressError::AddressOverflow {
            base: rule
                .range
                .start
                .clone()
                .or_else(|| rule.range.subnet.clone())
                .unwrap_or_default(),
            offset: index,
        })?;
        meta.insert(rule.key.clone(), compute_address(&rule.range, offset)?.to_string());
    }

    for rule in &template.indexes {
        let step = if rule.step == 0 { 1 } else { rule.step };
        let value = rule.offset.wrapping_add(index.wrapping_mul(step));
        meta.insert(rule.key.clone(), format!("{}{}{}", rule.prefix, value, rule.suffix));
    }

    for rule in &template.namespaces {
        meta.insert(rule.key.clone(), request.namespace().to_string());
    }

    for rule in &template.object_names {
        meta.insert(rule.key.clone(), node.object(&rule.object)?.name.clone());
    }

    for rule in &template.from_labels {
        let labels = &node.object(&rule.object)?.labels;
        meta.insert(rule.key.clone(), labels.get(&rule.label).cloned().unwrap_or_default());
    }

    for rule in &template.from_annotations {
        let annotations = &node.object(&rule.object)?.annotations;
        meta.insert(
            rule.key.clone(),
            annotations.get(&rule.annotation).cloned().unwrap_or_default(),
        );
    }

    for rule in &template.strings {
        meta.insert(rule.key.clone(), rule.value.clone());
    }

    Ok(meta)
}

/// Render the network data document
pub fn render_network_data(
    template: &NetworkDataTemplate,
    pools: &PoolCache,
    host: &Host,
) -> Result<NetworkData> {
    Ok(NetworkData {
        links: render_links(&template.links, host)?,
        networks: render_networks(&template.networks, pools)?,
        services: render_services(&template.services),
    })
}

fn render_links(links: &NetworkLinks, host: &Host) -> Result<Vec<LinkEntry>> {
    let mut entries = Vec::with_capacity(links.ethernets.len() + links.bonds.len() + links.vlans.len());

    for link in &links.ethernets {
        entries.push(LinkEntry::Ethernet(EthernetEntry {
            ethernet_mac_address: link_mac(&link.mac_address, host)?,
            id: link.id.clone(),
            mtu: link.mtu,
            link_type: link.link_type.clone(),
        }));
    }

    for link in &links.bonds {
        entries.push(LinkEntry::Bond(BondEntry {
            bond_links: link.bond_links.clone(),
            bond_mode: link.bond_mode.clone(),
            ethernet_mac_address: link_mac(&link.mac_address, host)?,
            id: link.id.clone(),
            mtu: link.mtu,
            link_type: "bond".to_string(),
        }));
    }

    for link in &links.vlans {
        entries.push(LinkEntry::Vlan(VlanEntry {
            id: link.id.clone(),
            mtu: link.mtu,
            link_type: "vlan".to_string(),
            vlan_id: link.vlan_id,
            vlan_link: link.vlan_link.clone(),
            vlan_mac_address: link_mac(&link.mac_address, host)?,
        }));
    }

    Ok(entries)
}

fn render_networks(networks: &NetworkNetworks, pools: &PoolCache) -> Result<Vec<NetworkEntry>> {
    let mut entries = Vec::new();

    for network in &networks.ipv4 {
        entries.push(static_network(network, "ipv4", true, pools)?);
    }
    for network in &networks.ipv6 {
        entries.push(static_network(network, "ipv6", false, pools)?);
    }
    for network in &networks.ipv4_dhcp {
        entries.push(dynamic_network(network, "ipv4_dhcp", true, pools)?);
    }
    for network in &networks.ipv6_dhcp {
        entries.push(dynamic_network(network, "ipv6_dhcp", false, pools)?);
    }
    for network in &networks.ipv6_slaac {
        entries.push(dynamic_network(network, "ipv6_slaac", false, pools)?);
    }

    Ok(entries)
}

fn static_network(
    network: &StaticNetwork,
    network_type: &str,
    is_v4: bool,
    pools: &PoolCache,
) -> Result<NetworkEntry> {
    let address = pool_address(pools, &network.ip_address_from_ip_pool)?;

    Ok(NetworkEntry::Static(StaticNetworkEntry {
        id: network.id.clone(),
        ip_address: address.address.clone(),
        link: network.link.clone(),
        netmask: mask_for(address.prefix, is_v4)?.to_string(),
        routes: render_routes(&network.routes, is_v4, pools)?,
        network_type: network_type.to_string(),
    }))
}

fn dynamic_network(
    network: &DynamicNetwork,
    network_type: &str,
    is_v4: bool,
    pools: &PoolCache,
) -> Result<NetworkEntry> {
    Ok(NetworkEntry::Dynamic(DynamicNetworkEntry {
        id: network.id.clone(),
        link: network.link.clone(),
        routes: render_routes(&network.routes, is_v4, pools)?,
        network_type: network_type.to_string(),
    }))
}

fn render_routes(routes: &[Route], is_v4: bool, pools: &PoolCache) -> Result<Vec<RouteEntry>> {
    routes
        .iter()
        .map(|route| {
            let gateway = match &route.gateway {
                Some(RouteGateway::String(gateway)) => gateway.clone(),
                Some(RouteGateway::FromIpPool(pool)) => {
                    pool_address(pools, pool)?.gateway.clone().unwrap_or_default()
                }
                None => String::new(),
            };

            Ok(RouteEntry {
                gateway,
                netmask: mask_for(route.prefix, is_v4)?.to_string(),
                network: route.network.clone(),
                services: render_services(&route.services),
            })
        })
        .collect()
}

fn render_services(services: &NetworkServices) -> Vec<ServiceEntry> {
    services.dns.iter().map(ServiceEntry::dns).collect()
}

fn pool_address<'a>(pools: &'a PoolCache, pool: &str) -> Result<&'a PoolAddress> {
    pools
        .get(pool)
        .ok_or_else(|| RenderError::PoolNotResolved(pool.to_string()))
}

fn link_mac(source: &MacAddressSource, host: &Host) -> Result<String> {
    match source {
        MacAddressSource::String(mac) => Ok(mac.clone()),
        MacAddressSource::FromHostInterface(interface) => Ok(host_mac(host, interface)?.to_string()),
    }
}

fn host_mac<'a>(host: &'a Host, interface: &str) -> Result<&'a str> {
    if host.nics().is_none() {
        return Err(RenderError::NicsNotPopulated(host.metadata.name.clone()));
    }

    host.mac_for(interface)
        .ok_or_else(|| RenderError::InterfaceNotFound {
            interface: interface.to_string(),
            host: host.metadata.name.clone(),
        })
}
