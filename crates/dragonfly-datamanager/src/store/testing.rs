use super::{DataStore, MemoryStore, Result, StoreError};
use async_trait::async_trait;
use dragonfly_crd::{BootDocument, DataRequest, DataTemplate, InfraMachine, IpAddressRecord, IpPool};
use std::sync::Arc;

/// Memory store whose pool updates always fail
pub(crate) struct FailingPoolUpdates {
    inner: Arc<MemoryStore>,
    error: fn(String) -> StoreError,
}

impl FailingPoolUpdates {
    /// Every update loses the race against another writer
    pub fn conflict(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            error: StoreError::Conflict,
        }
    }

    /// Every update hits a broken backend
    pub fn database(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            error: StoreError::Database,
        }
    }
}

#[async_trait]
impl DataStore for FailingPoolUpdates {
    async fn get_request(&self, ns: &str, name: &str) -> Result<Option<DataRequest>> {
        self.inner.get_request(ns, name).await
    }
    async fn list_requests(&self) -> Result<Vec<DataRequest>> {
        self.inner.list_requests().await
    }
    async fn put_request(&self, request: &DataRequest) -> Result<()> {
        self.inner.put_request(request).await
    }
    async fn get_template(&self, ns: &str, name: &str) -> Result<Option<DataTemplate>> {
        self.inner.get_template(ns, name).await
    }
    async fn get_pool(&self, ns: &str, name: &str) -> Result<Option<IpPool>> {
        self.inner.get_pool(ns, name).await
    }
    async fn update_pool(&self, pool: &IpPool) -> Result<()> {
        Err((self.error)(pool.metadata.name.clone()))
    }
    async fn get_address(&self, ns: &str, name: &str) -> Result<Option<IpAddressRecord>> {
        self.inner.get_address(ns, name).await
    }
    async fn get_infra_machine(&self, ns: &str, name: &str) -> Result<Option<InfraMachine>> {
        self.inner.get_infra_machine(ns, name).await
    }
    async fn get_document(&self, ns: &str, name: &str) -> Result<Option<BootDocument>> {
        self.inner.get_document(ns, name).await
    }
    async fn create_document(&self, document: &BootDocument) -> Result<()> {
        self.inner.create_document(document).await
    }
}
