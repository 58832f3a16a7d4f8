//! Resource bundles
//!
//! A bundle is a single YAML file holding every object a reconcile needs,
//! grouped by kind. It is loaded into a [`MemoryStore`].

use color_eyre::eyre::{Result, WrapErr};
use dragonfly_crd::{DataRequest, DataTemplate, Host, InfraMachine, IpAddressRecord, IpPool, Machine};
use dragonfly_datamanager::{DataStore, MemoryStore};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bundle {
    pub templates: Vec<DataTemplate>,
    pub pools: Vec<IpPool>,
    pub addresses: Vec<IpAddressRecord>,
    pub machines: Vec<Machine>,
    pub infra_machines: Vec<InfraMachine>,
    pub hosts: Vec<Host>,
    pub requests: Vec<DataRequest>,
}

impl Bundle {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read bundle {}", path.display()))?;
        serde_yaml::from_str(&text).wrap_err_with(|| format!("invalid bundle {}", path.display()))
    }

    pub async fn into_store(self) -> Result<Arc<MemoryStore>> {
        debug!(
            templates = self.templates.len(),
            pools = self.pools.len(),
            requests = self.requests.len(),
            "Loading bundle"
        );

        let store = MemoryStore::new();
        for template in self.templates {
            template.validate()?;
            store.insert_template(template)?;
        }
        for pool in self.pools {
            store.insert_pool(pool)?;
        }
        for address in self.addresses {
            store.insert_address(address)?;
        }
        for machine in self.machines {
            store.insert_machine(machine)?;
        }
        for infra_machine in self.infra_machines {
            store.insert_infra_machine(infra_machine)?;
        }
        for host in self.hosts {
            host.validate()?;
            store.insert_host(host)?;
        }
        for request in &self.requests {
            store.put_request(request).await?;
        }
        Ok(Arc::new(store))
    }
}
