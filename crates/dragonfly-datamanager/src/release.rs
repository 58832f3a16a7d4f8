//! Pool claim release
//!
//! Teardown counterpart of [`PoolResolver`](crate::PoolResolver): drops the
//! request's claim marker from every pool the template references, so the
//! allocator can reclaim the addresses.

use crate::error::Result;
use crate::store::{DataStore, StoreError};
use dragonfly_crd::{DataRequest, DataTemplate, OwnerReference};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a release pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No pool carries the request's claim any more
    Released,
    /// Some pool changed while releasing; run the pass again
    Retry,
}

/// Removes a request's claims from its pools
pub struct ReleaseCoordinator {
    store: Arc<dyn DataStore>,
}

impl ReleaseCoordinator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Release every pool `template` references. Idempotent.
    pub async fn release(&self, request: &DataRequest, template: &DataTemplate) -> Result<ReleaseOutcome> {
        let claimant = request.owner_reference(false);
        let mut retry = false;

        for pool in template.pool_refs() {
            if !self.release_pool(request, &claimant, pool).await? {
                retry = true;
            }
        }

        Ok(if retry {
            ReleaseOutcome::Retry
        } else {
            ReleaseOutcome::Released
        })
    }

    /// Returns whether the pool is free of the claim
    async fn release_pool(
        &self,
        request: &DataRequest,
        claimant: &OwnerReference,
        pool_name: &str,
    ) -> Result<bool> {
        let Some(mut pool) = self.store.get_pool(request.namespace(), pool_name).await? else {
            return Ok(true);
        };

        if !pool.release_claim(claimant) {
            return Ok(true);
        }

        match self.store.update_pool(&pool).await {
            Ok(()) => {
                info!(request = %request.name(), pool = %pool_name, "Released pool claim");
                Ok(true)
            }
            Err(StoreError::NotFound(_)) => Ok(true),
            Err(StoreError::Conflict(_)) => {
                debug!(request = %request.name(), pool = %pool_name, "Pool changed while releasing");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::store::testing::FailingPoolUpdates;
    use crate::store::MemoryStore;
    use dragonfly_crd::{
        AddressRange, IpPool, IpPoolSpec, NetworkDataTemplate, Route, RouteGateway, StaticNetwork,
        NetworkServices,
    };

    fn template() -> DataTemplate {
        let mut network = NetworkDataTemplate::default();
        network.networks.ipv4.push(StaticNetwork {
            id: "eth0-v4".to_string(),
            link: "eth0".to_string(),
            ip_address_from_ip_pool: "pool-a".to_string(),
            routes: vec![Route {
                network: "0.0.0.0".to_string(),
                prefix: 0,
                gateway: Some(RouteGateway::FromIpPool("pool-gw".to_string())),
                services: NetworkServices::default(),
            }],
        });
        DataTemplate::new("workers").with_network_data(network)
    }

    fn pool(name: &str) -> IpPool {
        IpPool::with_namespace(
            name,
            "metal",
            IpPoolSpec::new(24).with_range(AddressRange::from_subnet("10.0.0.0/24")),
        )
    }

    #[tokio::test]
    async fn test_release_removes_only_own_claim() {
        let store = Arc::new(MemoryStore::new());
        let request = DataRequest::new("node-0", "metal", "workers", 0);
        let other = DataRequest::new("node-1", "metal", "workers", 1);

        for name in ["pool-a", "pool-gw"] {
            let mut p = pool(name);
            p.ensure_claim(&request.owner_reference(false));
            p.ensure_claim(&other.owner_reference(false));
            store.insert_pool(p).unwrap();
        }

        let coordinator = ReleaseCoordinator::new(store.clone());
        let outcome = coordinator.release(&request, &template()).await.unwrap();
        assert_eq!(outcome, ReleaseOutcome::Released);

        for name in ["pool-a", "pool-gw"] {
            let p = store.get_pool("metal", name).await.unwrap().unwrap();
            assert!(!p.is_claimed_by(&request.owner_reference(false)));
            assert!(p.is_claimed_by(&other.owner_reference(false)));
        }
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let request = DataRequest::new("node-0", "metal", "workers", 0);
        let mut p = pool("pool-a");
        p.ensure_claim(&request.owner_reference(false));
        store.insert_pool(p).unwrap();

        let coordinator = ReleaseCoordinator::new(store.clone());
        // pool-gw does not exist, which counts as released
        assert_eq!(
            coordinator.release(&request, &template()).await.unwrap(),
            ReleaseOutcome::Released
        );
        assert_eq!(
            coordinator.release(&request, &template()).await.unwrap(),
            ReleaseOutcome::Released
        );
    }

    #[tokio::test]
    async fn test_conflict_while_releasing_means_retry() {
        let inner = Arc::new(MemoryStore::new());
        let request = DataRequest::new("node-0", "metal", "workers", 0);
        let mut p = pool("pool-a");
        p.ensure_claim(&request.owner_reference(false));
        inner.insert_pool(p).unwrap();

        let store = FailingPoolUpdates::conflict(inner.clone());
        let coordinator = ReleaseCoordinator::new(Arc::new(store));
        assert_eq!(
            coordinator.release(&request, &template()).await.unwrap(),
            ReleaseOutcome::Retry
        );

        // the claim survives until a later pass succeeds
        let stored = inner.get_pool("metal", "pool-a").await.unwrap().unwrap();
        assert!(stored.is_claimed_by(&request.owner_reference(false)));
    }

    #[tokio::test]
    async fn test_store_failure_while_releasing_is_returned() {
        let inner = Arc::new(MemoryStore::new());
        let request = DataRequest::new("node-0", "metal", "workers", 0);
        let mut p = pool("pool-a");
        p.ensure_claim(&request.owner_reference(false));
        inner.insert_pool(p).unwrap();

        let coordinator = ReleaseCoordinator::new(Arc::new(FailingPoolUpdates::database(inner)));
        let err = coordinator.release(&request, &template()).await.unwrap_err();
        assert!(matches!(err, DataError::Store(StoreError::Database(_))));
        assert!(!err.is_terminal());
    }
}
