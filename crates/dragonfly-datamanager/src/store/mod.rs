//! Storage traits for boot data reconciliation
//!
//! The data manager never talks to a database directly. Objects are read and
//! written through [`DataStore`]; the node objects a template reads from are
//! found through [`NodeLookup`].
//!
//! Reads return `Ok(None)` when the object does not exist. Pool updates are
//! checked against `metadata.resourceVersion` and fail with
//! [`StoreError::Conflict`] when the stored object changed in between.

mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;

use async_trait::async_trait;
use dragonfly_crd::{
    BootDocument, DataRequest, DataTemplate, Host, InfraMachine, IpAddressRecord, IpPool, Machine,
};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The object changed since it was read
    #[error("conflict: {0} was modified")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Object store used by the data manager
///
/// Objects are addressed by namespace and name.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Get a request
    async fn get_request(&self, namespace: &str, name: &str) -> Result<Option<DataRequest>>;

    /// List all requests
    async fn list_requests(&self) -> Result<Vec<DataRequest>>;

    /// Store a request, replacing any previous version
    async fn put_request(&self, request: &DataRequest) -> Result<()>;

    async fn get_template(&self, namespace: &str, name: &str) -> Result<Option<DataTemplate>>;

    async fn get_pool(&self, namespace: &str, name: &str) -> Result<Option<IpPool>>;

    /// Write back a pool read earlier.
    ///
    /// Fails with [`StoreError::Conflict`] if the stored resource version no
    /// longer matches the one on `pool`.
    async fn update_pool(&self, pool: &IpPool) -> Result<()>;

    async fn get_address(&self, namespace: &str, name: &str) -> Result<Option<IpAddressRecord>>;

    async fn get_infra_machine(&self, namespace: &str, name: &str)
        -> Result<Option<InfraMachine>>;

    async fn get_document(&self, namespace: &str, name: &str) -> Result<Option<BootDocument>>;

    /// Create a document. Fails with [`StoreError::AlreadyExists`] if one
    /// with the same name exists; documents are never overwritten.
    async fn create_document(&self, document: &BootDocument) -> Result<()>;
}

/// Finds the node objects behind an infrastructure machine.
///
/// `Ok(None)` means the link is not populated yet.
#[async_trait]
pub trait NodeLookup: Send + Sync {
    /// The `Machine` owning `infra_machine`
    async fn owner_machine(&self, infra_machine: &InfraMachine) -> Result<Option<Machine>>;

    /// The `Host` consumed by `infra_machine`
    async fn host_for(&self, infra_machine: &InfraMachine) -> Result<Option<Host>>;
}
