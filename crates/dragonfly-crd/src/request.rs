//! DataRequest and BootDocument CRD types
//!
//! A DataRequest asks for the documents of one machine, rendered from a
//! DataTemplate. The rendered documents are stored as BootDocuments, one per
//! document kind, and are never regenerated once written.

use crate::{CrdError, ObjectMeta, ObjectRef, OwnerReference, Result, TypeMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the metadata document inside its BootDocument
pub const META_DATA_KEY: &str = "metaData";

/// Key of the network data document inside its BootDocument
pub const NETWORK_DATA_KEY: &str = "networkData";

/// Request for one machine's rendered boot data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata (name, namespace, labels, etc.)
    pub metadata: ObjectMeta,

    /// Request specification
    pub spec: DataRequestSpec,

    /// Request status (set by the data manager)
    #[serde(default)]
    pub status: DataRequestStatus,
}

impl DataRequest {
    /// Create a new DataRequest
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        template: impl Into<String>,
        index: i64,
    ) -> Self {
        Self {
            type_meta: TypeMeta::data_request(),
            metadata: ObjectMeta::with_namespace(name, namespace),
            spec: DataRequestSpec {
                template: Some(ObjectRef::new(template)),
                index,
                infra_machine: None,
                meta_data: None,
                network_data: None,
            },
            status: DataRequestStatus::default(),
        }
    }

    /// Set the requesting infrastructure machine
    pub fn with_infra_machine(mut self, name: impl Into<String>) -> Self {
        self.spec.infra_machine = Some(ObjectRef::new(name));
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace()
    }

    /// Reference used to claim pools and to own rendered documents
    pub fn owner_reference(&self, controller: bool) -> OwnerReference {
        OwnerReference::to_object(&self.type_meta, &self.metadata, controller)
    }

    /// Validate the request
    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.is_empty() {
            return Err(CrdError::MissingField("metadata.name".to_string()));
        }
        if let Some(template) = &self.spec.template {
            if template.name.is_empty() {
                return Err(CrdError::MissingField("spec.template.name".to_string()));
            }
        }
        if let Some(machine) = &self.spec.infra_machine {
            if machine.name.is_empty() {
                return Err(CrdError::MissingField("spec.infraMachine.name".to_string()));
            }
        }
        Ok(())
    }

    /// Clear a previous error. An errored request starts over as `Fresh`.
    pub fn clear_error(&mut self) {
        if self.status.phase == DataPhase::Errored {
            self.status.phase = DataPhase::Fresh;
        }
        self.status.error = false;
        self.status.error_message = None;
    }

    /// Record a terminal error
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status.phase = DataPhase::Errored;
        self.status.ready = false;
        self.status.error = true;
        self.status.error_message = Some(message.into());
        self.status.last_updated = Some(chrono::Utc::now());
    }

    /// Record that pools are still being allocated
    pub fn set_pending(&mut self) {
        self.status.phase = DataPhase::PendingPools;
        self.status.ready = false;
        self.status.last_updated = Some(chrono::Utc::now());
    }

    /// Record that all documents exist
    pub fn set_ready(&mut self) {
        self.status.phase = DataPhase::Ready;
        self.status.ready = true;
        self.status.last_updated = Some(chrono::Utc::now());
    }

    pub fn is_ready(&self) -> bool {
        self.status.ready
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataRequestSpec {
    /// Template to render; nothing is rendered without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<ObjectRef>,

    /// Index of the machine, used by index-derived rules
    #[serde(default)]
    pub index: i64,

    /// Machine the documents are rendered for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infra_machine: Option<ObjectRef>,

    /// Metadata document, defaulted to `<machine>-metadata`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<DocumentRef>,

    /// Network data document, defaulted to `<machine>-networkdata`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_data: Option<DocumentRef>,
}

/// Reference to a BootDocument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl DocumentRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataRequestStatus {
    #[serde(default)]
    pub phase: DataPhase,

    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub error: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lifecycle of a DataRequest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DataPhase {
    /// Never reconciled
    #[default]
    Fresh,
    /// Waiting for the allocator to fulfil pool claims
    PendingPools,
    /// All documents exist
    Ready,
    /// A terminal error was recorded
    Errored,
}

/// A rendered document, stored like a secret
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BootDocument {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,

    /// Document payloads keyed by [`META_DATA_KEY`] or [`NETWORK_DATA_KEY`]
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl BootDocument {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::boot_document(),
            metadata: ObjectMeta::with_namespace(name, namespace),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}
