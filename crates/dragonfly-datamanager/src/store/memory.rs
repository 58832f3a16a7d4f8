//! In-memory storage backend
//!
//! Used by tests and by the offline CLI. Every write stamps the object with
//! a fresh resource version, so stale pool updates are detected the same
//! way a real object store would detect them.

use super::{DataStore, NodeLookup, Result, StoreError};
use async_trait::async_trait;
use dragonfly_crd::{
    BootDocument, DataRequest, DataTemplate, Host, InfraMachine, IpAddressRecord, IpPool, Machine,
    ObjectMeta,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

type Table<T> = RwLock<HashMap<String, T>>;

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    requests: Table<DataRequest>,
    templates: Table<DataTemplate>,
    pools: Table<IpPool>,
    addresses: Table<IpAddressRecord>,
    machines: Table<Machine>,
    infra_machines: Table<InfraMachine>,
    hosts: Table<Host>,
    documents: Table<BootDocument>,
    version: AtomicU64,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

fn meta_key(meta: &ObjectMeta) -> String {
    key(meta.namespace(), &meta.name)
}

fn read<T: Clone>(table: &Table<T>, key: &str) -> Result<Option<T>> {
    let guard = table
        .read()
        .map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;
    Ok(guard.get(key).cloned())
}

fn list<T: Clone>(table: &Table<T>) -> Result<Vec<T>> {
    let guard = table
        .read()
        .map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;
    let mut entries: Vec<(&String, &T)> = guard.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    Ok(entries.into_iter().map(|(_, v)| v.clone()).collect())
}

fn write<T>(table: &Table<T>, key: String, value: T) -> Result<()> {
    let mut guard = table
        .write()
        .map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;
    guard.insert(key, value);
    Ok(())
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn stamp(&self, meta: &mut ObjectMeta) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        meta.resource_version = Some(version.to_string());
    }

    pub fn insert_template(&self, mut template: DataTemplate) -> Result<()> {
        self.stamp(&mut template.metadata);
        write(&self.templates, meta_key(&template.metadata), template)
    }

    /// Store a pool unconditionally, as the allocator does
    pub fn insert_pool(&self, mut pool: IpPool) -> Result<()> {
        self.stamp(&mut pool.metadata);
        write(&self.pools, meta_key(&pool.metadata), pool)
    }

    pub fn insert_address(&self, mut address: IpAddressRecord) -> Result<()> {
        self.stamp(&mut address.metadata);
        write(&self.addresses, meta_key(&address.metadata), address)
    }

    pub fn insert_machine(&self, mut machine: Machine) -> Result<()> {
        self.stamp(&mut machine.metadata);
        write(&self.machines, meta_key(&machine.metadata), machine)
    }

    pub fn insert_infra_machine(&self, mut infra_machine: InfraMachine) -> Result<()> {
        self.stamp(&mut infra_machine.metadata);
        write(&self.infra_machines, meta_key(&infra_machine.metadata), infra_machine)
    }

    pub fn insert_host(&self, mut host: Host) -> Result<()> {
        self.stamp(&mut host.metadata);
        write(&self.hosts, meta_key(&host.metadata), host)
    }

    /// All pools, ordered by namespace and name
    pub fn list_pools(&self) -> Result<Vec<IpPool>> {
        list(&self.pools)
    }

    /// All documents, ordered by namespace and name
    pub fn list_documents(&self) -> Result<Vec<BootDocument>> {
        list(&self.documents)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get_request(&self, namespace: &str, name: &str) -> Result<Option<DataRequest>> {
        read(&self.requests, &key(namespace, name))
    }

    async fn list_requests(&self) -> Result<Vec<DataRequest>> {
        list(&self.requests)
    }

    async fn put_request(&self, request: &DataRequest) -> Result<()> {
        let mut request = request.clone();
        self.stamp(&mut request.metadata);
        write(&self.requests, meta_key(&request.metadata), request)
    }

    async fn get_template(&self, namespace: &str, name: &str) -> Result<Option<DataTemplate>> {
        read(&self.templates, &key(namespace, name))
    }

    async fn get_pool(&self, namespace: &str, name: &str) -> Result<Option<IpPool>> {
        read(&self.pools, &key(namespace, name))
    }

    async fn update_pool(&self, pool: &IpPool) -> Result<()> {
        let key = meta_key(&pool.metadata);
        let mut guard = self
            .pools
            .write()
            .map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;

        let stored = guard
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if stored.metadata.resource_version != pool.metadata.resource_version {
            return Err(StoreError::Conflict(key));
        }

        let mut pool = pool.clone();
        self.stamp(&mut pool.metadata);
        guard.insert(key, pool);
        Ok(())
    }

    async fn get_address(&self, namespace: &str, name: &str) -> Result<Option<IpAddressRecord>> {
        read(&self.addresses, &key(namespace, name))
    }

    async fn get_infra_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<InfraMachine>> {
        read(&self.infra_machines, &key(namespace, name))
    }

    async fn get_document(&self, namespace: &str, name: &str) -> Result<Option<BootDocument>> {
        read(&self.documents, &key(namespace, name))
    }

    async fn create_document(&self, document: &BootDocument) -> Result<()> {
        let key = meta_key(&document.metadata);
        let mut guard = self
            .documents
            .write()
            .map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;

        if guard.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }

        let mut document = document.clone();
        self.stamp(&mut document.metadata);
        guard.insert(key, document);
        Ok(())
    }
}

#[async_trait]
impl NodeLookup for MemoryStore {
    async fn owner_machine(&self, infra_machine: &InfraMachine) -> Result<Option<Machine>> {
        match infra_machine.owner_machine_name() {
            Some(name) => read(
                &self.machines,
                &key(infra_machine.metadata.namespace(), name),
            ),
            None => Ok(None),
        }
    }

    async fn host_for(&self, infra_machine: &InfraMachine) -> Result<Option<Host>> {
        match &infra_machine.spec.host_ref {
            Some(host) => {
                let namespace = host.namespace_or(infra_machine.metadata.namespace());
                read(&self.hosts, &key(namespace, &host.name))
            }
            None => Ok(None),
        }
    }
}
