//! Common metadata types for CRDs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Namespace used when an object does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Kubernetes-style object metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name (required)
    pub name: String,

    /// Namespace (optional, defaults to "default")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Unique identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    /// Resource version for optimistic concurrency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Labels for organizing resources
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    /// Annotations for storing arbitrary metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,

    /// Objects this resource is owned by or claimed by
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,

    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl ObjectMeta {
    /// Create new metadata with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create new metadata with name and namespace
    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Set the uid
    pub fn with_uid(mut self, uid: Uuid) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Add an owner reference
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner_references.push(owner);
        self
    }

    /// Namespace, falling back to [`DEFAULT_NAMESPACE`]
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Whether `owner` is already listed in the owner references
    pub fn has_owner(&self, owner: &OwnerReference) -> bool {
        self.owner_references.iter().any(|r| r.refers_to_same(owner))
    }

    /// Append `owner` unless an equivalent reference is present.
    ///
    /// Returns `true` when the list changed.
    pub fn add_owner(&mut self, owner: OwnerReference) -> bool {
        if self.has_owner(&owner) {
            return false;
        }
        self.owner_references.push(owner);
        true
    }

    /// Remove every reference equivalent to `owner`.
    ///
    /// Returns `true` when the list changed.
    pub fn remove_owner(&mut self, owner: &OwnerReference) -> bool {
        let before = self.owner_references.len();
        self.owner_references.retain(|r| !r.refers_to_same(owner));
        self.owner_references.len() != before
    }

    /// First owner reference of the given kind
    pub fn owner_of_kind(&self, kind: &str) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.kind == kind)
    }
}

/// Reference from one object to an object that owns (or claims) it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    /// API version of the owner
    pub api_version: String,

    /// Kind of the owner
    pub kind: String,

    /// Name of the owner
    pub name: String,

    /// Uid of the owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    /// Whether the owner manages this object's lifecycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
}

impl OwnerReference {
    /// Build a reference to the object described by `type_meta` and `meta`
    pub fn to_object(type_meta: &TypeMeta, meta: &ObjectMeta, controller: bool) -> Self {
        Self {
            api_version: type_meta.api_version.clone(),
            kind: type_meta.kind.clone(),
            name: meta.name.clone(),
            uid: meta.uid,
            controller: controller.then_some(true),
        }
    }

    /// Whether both references point at the same object.
    ///
    /// The controller flag is ignored. Uids are compared only when both
    /// sides carry one.
    pub fn refers_to_same(&self, other: &OwnerReference) -> bool {
        let uid_matches = match (self.uid, other.uid) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        self.kind == other.kind && self.name == other.name && uid_matches
    }

    pub fn is_controller(&self) -> bool {
        self.controller.unwrap_or(false)
    }
}

/// Reference to a named object, optionally in another namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Namespace of the referenced object, defaulting to `fallback`
    pub fn namespace_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => fallback,
        }
    }
}

/// Type metadata for CRD objects
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// API version (e.g., "dragonfly.computer/v1")
    pub api_version: String,

    /// Kind (e.g., "DataTemplate", "IpPool", "DataRequest")
    pub kind: String,
}

impl TypeMeta {
    fn of_kind(kind: &str) -> Self {
        Self {
            api_version: crate::API_VERSION.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Create type metadata for DataTemplate
    pub fn data_template() -> Self {
        Self::of_kind(crate::KIND_DATA_TEMPLATE)
    }

    /// Create type metadata for DataRequest
    pub fn data_request() -> Self {
        Self::of_kind(crate::KIND_DATA_REQUEST)
    }

    /// Create type metadata for IpPool
    pub fn ip_pool() -> Self {
        Self::of_kind(crate::KIND_IP_POOL)
    }

    /// Create type metadata for IpAddress
    pub fn ip_address() -> Self {
        Self::of_kind(crate::KIND_IP_ADDRESS)
    }

    /// Create type metadata for BootDocument
    pub fn boot_document() -> Self {
        Self::of_kind(crate::KIND_BOOT_DOCUMENT)
    }

    /// Create type metadata for Machine
    pub fn machine() -> Self {
        Self::of_kind(crate::KIND_MACHINE)
    }

    /// Create type metadata for InfraMachine
    pub fn infra_machine() -> Self {
        Self::of_kind(crate::KIND_INFRA_MACHINE)
    }

    /// Create type metadata for Host
    pub fn host() -> Self {
        Self::of_kind(crate::KIND_HOST)
    }
}
