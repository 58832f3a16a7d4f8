//! IP pool and IP address CRD types
//!
//! An `IpPool` hands out addresses to claimants. A claimant registers
//! interest by adding an owner reference to the pool; the allocator then
//! records the claimant in `status.allocations` and creates an
//! `IpAddressRecord` holding the concrete address.

use crate::{ObjectMeta, OwnerReference, TypeMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pool of addresses shared by many requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpPool {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,

    pub spec: IpPoolSpec,

    #[serde(default)]
    pub status: IpPoolStatus,
}

impl IpPool {
    pub fn new(name: impl Into<String>, spec: IpPoolSpec) -> Self {
        Self {
            type_meta: TypeMeta::ip_pool(),
            metadata: ObjectMeta::new(name),
            spec,
            status: IpPoolStatus::default(),
        }
    }

    pub fn with_namespace(
        name: impl Into<String>,
        namespace: impl Into<String>,
        spec: IpPoolSpec,
    ) -> Self {
        Self {
            type_meta: TypeMeta::ip_pool(),
            metadata: ObjectMeta::with_namespace(name, namespace),
            spec,
            status: IpPoolStatus::default(),
        }
    }

    /// Register interest of `claimant` in this pool.
    ///
    /// Idempotent: returns `true` only if the pool was modified and needs to
    /// be written back.
    pub fn ensure_claim(&mut self, claimant: &OwnerReference) -> bool {
        let mut marker = claimant.clone();
        marker.controller = None;
        self.metadata.add_owner(marker)
    }

    /// Drop the claim of `claimant`. Returns `true` if the pool was modified.
    pub fn release_claim(&mut self, claimant: &OwnerReference) -> bool {
        self.metadata.remove_owner(claimant)
    }

    /// Whether `claimant` currently holds a claim on this pool
    pub fn is_claimed_by(&self, claimant: &OwnerReference) -> bool {
        self.metadata.has_owner(claimant)
    }

    /// Allocation state for the claimant named `claimant`
    pub fn claim_state(&self, claimant: &str) -> ClaimState<'_> {
        match self.status.allocations.get(claimant) {
            None => ClaimState::Pending,
            Some(record) if record.is_empty() => ClaimState::Exhausted,
            Some(record) => ClaimState::Assigned(record),
        }
    }
}

/// Where a claim stands from the claimant's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState<'a> {
    /// The allocator has not looked at the claim yet
    Pending,
    /// The allocator gave up: no address left for this claimant
    Exhausted,
    /// Name of the address record holding the assignment
    Assigned(&'a str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IpPoolSpec {
    /// Address ranges, tried in order by the allocator
    #[serde(default)]
    pub ranges: Vec<AddressRange>,

    /// Prefix length handed out with every address
    #[serde(default)]
    pub prefix: u8,

    /// Gateway handed out with every address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

impl IpPoolSpec {
    pub fn new(prefix: u8) -> Self {
        Self {
            ranges: Vec::new(),
            prefix,
            gateway: None,
        }
    }

    pub fn with_range(mut self, range: AddressRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }
}

/// Numeric range of addresses.
///
/// Either `start` (with an optional inclusive `end`) or `subnet` must be set.
/// Without `start`, the first usable address is the subnet's network address
/// plus one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AddressRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,

    /// CIDR, e.g. `192.168.0.0/24`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

impl AddressRange {
    pub fn from_start(start: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            ..Default::default()
        }
    }

    pub fn from_subnet(subnet: impl Into<String>) -> Self {
        Self {
            subnet: Some(subnet.into()),
            ..Default::default()
        }
    }

    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_subnet(mut self, subnet: impl Into<String>) -> Self {
        self.subnet = Some(subnet.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IpPoolStatus {
    /// Claimant name to address record name. Written only by the allocator.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocations: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

/// A concrete address assigned to one claimant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpAddressRecord {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,

    pub spec: IpAddressSpec,
}

impl IpAddressRecord {
    pub fn new(name: impl Into<String>, spec: IpAddressSpec) -> Self {
        Self {
            type_meta: TypeMeta::ip_address(),
            metadata: ObjectMeta::new(name),
            spec,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpAddressSpec {
    pub address: String,

    pub prefix: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    /// Pool the address was taken from
    #[serde(default)]
    pub pool: String,

    /// Claimant the address was assigned to
    #[serde(default)]
    pub claim: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::API_VERSION;

    fn claimant(name: &str) -> OwnerReference {
        OwnerReference {
            api_version: API_VERSION.to_string(),
            kind: "DataRequest".to_string(),
            name: name.to_string(),
            uid: None,
            controller: Some(true),
        }
    }

    fn pool() -> IpPool {
        IpPool::with_namespace(
            "pool-a",
            "metal",
            IpPoolSpec::new(24)
                .with_range(AddressRange::from_start("10.0.0.10").with_end("10.0.0.20"))
                .with_gateway("10.0.0.1"),
        )
    }

    #[test]
    fn test_ensure_claim_is_idempotent() {
        let mut pool = pool();
        assert!(pool.ensure_claim(&claimant("node-0")));
        assert!(!pool.ensure_claim(&claimant("node-0")));
        assert!(pool.is_claimed_by(&claimant("node-0")));
        // The marker never takes control of the pool
        assert!(!pool.metadata.owner_references[0].is_controller());
    }

    #[test]
    fn test_release_claim() {
        let mut pool = pool();
        pool.ensure_claim(&claimant("node-0"));
        pool.ensure_claim(&claimant("node-1"));

        assert!(pool.release_claim(&claimant("node-0")));
        assert!(!pool.release_claim(&claimant("node-0")));
        assert!(pool.is_claimed_by(&claimant("node-1")));
    }

    #[test]
    fn test_claim_state() {
        let mut pool = pool();
        assert_eq!(pool.claim_state("node-0"), ClaimState::Pending);

        pool.status
            .allocations
            .insert("node-0".to_string(), "pool-a-node-0".to_string());
        pool.status.allocations.insert("node-1".to_string(), String::new());

        assert_eq!(pool.claim_state("node-0"), ClaimState::Assigned("pool-a-node-0"));
        assert_eq!(pool.claim_state("node-1"), ClaimState::Exhausted);
    }

    #[test]
    fn test_pool_yaml_format() {
        let yaml = r#"
apiVersion: dragonfly.computer/v1
kind: IpPool
metadata:
  name: pool-a
spec:
  prefix: 24
  gateway: 192.168.0.1
  ranges:
    - subnet: 192.168.0.0/24
status:
  allocations:
    node-0: pool-a-node-0
"#;
        let pool: IpPool = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(pool.spec.prefix, 24);
        assert_eq!(pool.spec.ranges[0].subnet.as_deref(), Some("192.168.0.0/24"));
        assert_eq!(pool.claim_state("node-0"), ClaimState::Assigned("pool-a-node-0"));
    }
}
