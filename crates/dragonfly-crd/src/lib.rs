//! Dragonfly CRD Types
//!
//! This crate provides CRD-compatible types for rendering boot-time data
//! (cloud-init metadata and network data) for bare metal machines.
//!
//! # API Group
//!
//! All types use the `dragonfly.computer/v1` API group.
//!
//! # Resources
//!
//! - `DataTemplate` - Declarative metadata and network data templates
//! - `DataRequest` - One machine's request for rendered documents
//! - `IpPool` / `IpAddressRecord` - Address pools and their allocations
//! - `BootDocument` - A rendered document, stored like a secret
//! - `Machine`, `InfraMachine`, `Host` - Node objects the templates read from

pub mod error;
pub mod hardware;
pub mod ippool;
pub mod metadata;
pub mod request;
pub mod template;

pub use error::*;
pub use hardware::*;
pub use ippool::*;
pub use metadata::*;
pub use request::*;
pub use template::*;

/// API version for all Dragonfly CRDs
pub const API_VERSION: &str = "dragonfly.computer/v1";

/// API group for all Dragonfly CRDs
pub const API_GROUP: &str = "dragonfly.computer";

/// API version string
pub const VERSION: &str = "v1";

pub const KIND_DATA_TEMPLATE: &str = "DataTemplate";
pub const KIND_DATA_REQUEST: &str = "DataRequest";
pub const KIND_IP_POOL: &str = "IpPool";
pub const KIND_IP_ADDRESS: &str = "IpAddress";
pub const KIND_BOOT_DOCUMENT: &str = "BootDocument";
pub const KIND_MACHINE: &str = "Machine";
pub const KIND_INFRA_MACHINE: &str = "InfraMachine";
pub const KIND_HOST: &str = "Host";

/// Label carrying the cluster a template (and its documents) belong to
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";
