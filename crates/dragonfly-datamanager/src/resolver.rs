//! Pool claim resolution
//!
//! Addresses are assigned by an external allocator. The resolver only
//! registers the request's claim on each pool it references and then looks
//! at whether the allocator has answered yet:
//!
//! ```text
//! get pool ─▶ ensure claim marker ─▶ allocations[request] ─▶ get address record
//!    │               │                      │                       │
//!  missing        conflict            absent: wait             missing: wait
//!  (wait)          (wait)             empty: exhausted         found: cache it
//! ```
//!
//! Waiting is not an error: the pass keeps going over the other pools and
//! reports `needs_retry` at the end.

use crate::error::{DataError, Result};
use crate::store::{DataStore, StoreError};
use dragonfly_crd::{ClaimState, DataRequest, DataTemplate, OwnerReference};
use dragonfly_metadata::{PoolAddress, PoolCache};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Addresses resolved so far
    pub pools: PoolCache,

    /// At least one pool has not produced an address yet
    pub needs_retry: bool,
}

/// Resolves the pools a template references into addresses
pub struct PoolResolver {
    store: Arc<dyn DataStore>,
}

impl PoolResolver {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Resolve every pool `template` references for `request`
    pub async fn resolve(&self, request: &DataRequest, template: &DataTemplate) -> Result<Resolution> {
        let mut pools = PoolCache::new();
        let needs_retry = self.resolve_into(request, template, &mut pools).await?;
        Ok(Resolution { pools, needs_retry })
    }

    /// Resolve into an existing cache. Pools already in `cache` are skipped.
    ///
    /// Returns whether any pool still has to be waited for.
    pub async fn resolve_into(
        &self,
        request: &DataRequest,
        template: &DataTemplate,
        cache: &mut PoolCache,
    ) -> Result<bool> {
        let claimant = request.owner_reference(false);
        let mut needs_retry = false;

        for pool in template.pool_refs() {
            if self.resolve_pool(request, &claimant, pool, cache).await? {
                needs_retry = true;
            }
        }

        if needs_retry {
            debug!(
                request = %request.name(),
                resolved = cache.len(),
                "Waiting for pool allocations"
            );
        }
        Ok(needs_retry)
    }

    async fn resolve_pool(
        &self,
        request: &DataRequest,
        claimant: &OwnerReference,
        pool_name: &str,
        cache: &mut PoolCache,
    ) -> Result<bool> {
        if cache.is_resolved(pool_name) {
            return Ok(false);
        }

        let namespace = request.namespace();
        let Some(mut pool) = self.store.get_pool(namespace, pool_name).await? else {
            debug!(request = %request.name(), pool = %pool_name, "Pool not found yet");
            return Ok(true);
        };

        if pool.ensure_claim(claimant) {
            match self.store.update_pool(&pool).await {
                Ok(()) => {
                    info!(request = %request.name(), pool = %pool_name, "Claimed address from pool");
                }
                Err(StoreError::Conflict(_)) => {
                    debug!(request = %request.name(), pool = %pool_name, "Pool changed while claiming");
                    return Ok(true);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match pool.claim_state(request.name()) {
            ClaimState::Pending => Ok(true),
            ClaimState::Exhausted => Err(DataError::PoolExhausted(pool_name.to_string())),
            ClaimState::Assigned(record) => {
                let Some(address) = self.store.get_address(namespace, record).await? else {
                    debug!(
                        request = %request.name(),
                        pool = %pool_name,
                        address = %record,
                        "Address record not found yet"
                    );
                    return Ok(true);
                };

                debug!(
                    request = %request.name(),
                    pool = %pool_name,
                    address = %address.spec.address,
                    "Resolved pool address"
                );
                cache.insert(
                    pool_name,
                    PoolAddress {
                        address: address.spec.address,
                        prefix: address.spec.prefix,
                        gateway: address.spec.gateway,
                    },
                );
                Ok(false)
            }
        }
    }
}
