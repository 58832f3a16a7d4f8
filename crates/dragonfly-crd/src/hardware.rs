//! Node CRD types
//!
//! Three objects describe a node from different angles:
//!
//! - `Machine` - the workload machine (owned by a cluster)
//! - `InfraMachine` - the infrastructure machine backing a `Machine`; it
//!   carries an owner reference to its `Machine` and points at its `Host`
//! - `Host` - the physical host, with the NICs found during inspection
//!
//! Templates read names, labels, annotations and NIC MAC addresses from them.

use crate::{CrdError, ObjectMeta, ObjectRef, Result, TypeMeta, KIND_MACHINE};
use serde::{Deserialize, Serialize};

/// Workload machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,
}

impl Machine {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::machine(),
            metadata: ObjectMeta::with_namespace(name, namespace),
        }
    }
}

/// Infrastructure machine, the object a DataRequest is made for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfraMachine {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: InfraMachineSpec,
}

impl InfraMachine {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::infra_machine(),
            metadata: ObjectMeta::with_namespace(name, namespace),
            spec: InfraMachineSpec::default(),
        }
    }

    /// Set the host backing this machine
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.spec.host_ref = Some(ObjectRef::new(host));
        self
    }

    /// Name of the owning `Machine`, once the machine controller set it
    pub fn owner_machine_name(&self) -> Option<&str> {
        self.metadata
            .owner_of_kind(KIND_MACHINE)
            .map(|owner| owner.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InfraMachineSpec {
    /// Host consumed by this machine, set once a host was picked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ref: Option<ObjectRef>,
}

/// Physical host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,

    /// Host status (set by inspection)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<HostStatus>,
}

impl Host {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::host(),
            metadata: ObjectMeta::with_namespace(name, namespace),
            status: None,
        }
    }

    /// Add an inspected NIC
    pub fn with_nic(mut self, name: impl Into<String>, mac: impl Into<String>) -> Self {
        let status = self.status.get_or_insert_with(HostStatus::default);
        let details = status
            .hardware_details
            .get_or_insert_with(HardwareDetails::default);
        details.nics.push(Nic::new(name, mac));
        self
    }

    /// NICs found during inspection, `None` until inspection ran
    pub fn nics(&self) -> Option<&[Nic]> {
        self.status
            .as_ref()
            .and_then(|s| s.hardware_details.as_ref())
            .map(|d| d.nics.as_slice())
    }

    /// MAC address of the NIC called `name`
    pub fn mac_for(&self, name: &str) -> Option<&str> {
        self.nics()?
            .iter()
            .find(|nic| nic.name == name)
            .map(|nic| nic.mac.as_str())
    }

    /// Validate the host resource
    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.is_empty() {
            return Err(CrdError::MissingField("metadata.name".to_string()));
        }

        for (i, nic) in self.nics().unwrap_or_default().iter().enumerate() {
            nic.validate().map_err(|e| CrdError::InvalidFieldValue {
                field: format!("status.hardwareDetails.nics[{}]", i),
                message: e.to_string(),
            })?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HostStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_details: Option<HardwareDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HardwareDetails {
    #[serde(default)]
    pub nics: Vec<Nic>,
}

/// Network interface found during inspection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nic {
    pub name: String,

    pub mac: String,
}

impl Nic {
    pub fn new(name: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mac: mac.into(),
        }
    }

    /// Validate the MAC address format
    pub fn validate(&self) -> Result<()> {
        if self.mac.is_empty() {
            return Err(CrdError::InvalidMacAddress("MAC address is empty".to_string()));
        }

        // MAC should be 6 bytes in hex, separated by colons or dashes
        let mac_clean = self.mac.replace([':', '-'], "");
        if mac_clean.len() != 12 || !mac_clean.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CrdError::InvalidMacAddress(self.mac.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OwnerReference, API_VERSION};

    #[test]
    fn test_host_mac_lookup() {
        let host = Host::new("host-0", "metal")
            .with_nic("eth0", "00:11:22:33:44:55")
            .with_nic("eth1", "00:11:22:33:44:66");

        assert_eq!(host.mac_for("eth1"), Some("00:11:22:33:44:66"));
        assert_eq!(host.mac_for("eth2"), None);
        assert_eq!(host.nics().map(<[Nic]>::len), Some(2));
    }

    #[test]
    fn test_host_without_inspection() {
        let host = Host::new("host-0", "metal");
        assert!(host.nics().is_none());
        assert_eq!(host.mac_for("eth0"), None);
        assert!(host.validate().is_ok());
    }

    #[test]
    fn test_host_validation() {
        let host = Host::new("host-0", "metal").with_nic("eth0", "not-a-mac");
        assert!(matches!(
            host.validate(),
            Err(CrdError::InvalidFieldValue { .. })
        ));

        assert!(Nic::new("eth0", "00-11-22-33-44-55").validate().is_ok());
        assert!(matches!(
            Nic::new("eth0", "").validate(),
            Err(CrdError::InvalidMacAddress(_))
        ));
    }

    #[test]
    fn test_infra_machine_owner() {
        let mut infra = InfraMachine::new("m3m-0", "metal").with_host("host-0");
        assert_eq!(infra.owner_machine_name(), None);

        infra.metadata.owner_references.push(OwnerReference {
            api_version: API_VERSION.to_string(),
            kind: "Machine".to_string(),
            name: "machine-0".to_string(),
            uid: None,
            controller: Some(true),
        });
        assert_eq!(infra.owner_machine_name(), Some("machine-0"));
        assert_eq!(infra.spec.host_ref.as_ref().map(|r| r.name.as_str()), Some("host-0"));
    }

    #[test]
    fn test_host_serialization() {
        let host = Host::new("host-0", "metal").with_nic("eth0", "00:11:22:33:44:55");
        let json = serde_json::to_string(&host).unwrap();
        assert!(json.contains("hardwareDetails"));
        let parsed: Host = serde_json::from_str(&json).unwrap();
        assert_eq!(host, parsed);
    }
}
