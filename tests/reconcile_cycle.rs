//! Full claim, allocate, render and release cycle against the memory store,
//! with a minimal allocator standing in for the external one.

use dragonfly_crd::{
    DataPhase, DataRequest, DataTemplate, Host, InfraMachine, IpAddressRecord, IpAddressSpec,
    IpPool, IpPoolSpec, Machine, OwnerReference, TypeMeta, KIND_DATA_REQUEST, META_DATA_KEY,
    NETWORK_DATA_KEY,
};
use dragonfly_datamanager::{
    DataError, DataManager, DataStore, MemoryStore, ReconcileOutcome, ReleaseOutcome,
};
use dragonfly_ipam::{compute_address, AddressError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const TEMPLATE: &str = r#"
apiVersion: dragonfly.computer/v1
kind: DataTemplate
metadata:
  name: workers
  namespace: metal
  labels:
    cluster.x-k8s.io/cluster-name: prod
spec:
  metaData:
    indexes:
      - key: hostname
        prefix: node-
        step: 1
    objectNames:
      - key: machine
        object: machine
    ipAddressesFromIPPool:
      - key: local-ipv4
        name: pool-a
  networkData:
    links:
      ethernets:
        - type: phy
          id: eth0
          macAddress:
            fromHostInterface: eth0
    networks:
      ipv4:
        - id: provisioning
          link: eth0
          ipAddressFromIPPool: pool-a
          routes:
            - network: 0.0.0.0
              prefix: 0
              gateway:
                fromIPPool: pool-a
      ipv6:
        - id: provisioning-v6
          link: eth0
          ipAddressFromIPPool: pool-v6
    services:
      dns:
        - 10.0.0.2
"#;

fn pools() -> Vec<IpPool> {
    use dragonfly_crd::AddressRange;
    vec![
        IpPool::with_namespace(
            "pool-a",
            "metal",
            IpPoolSpec::new(24)
                .with_range(AddressRange::from_start("10.0.0.10").with_end("10.0.0.11"))
                .with_gateway("10.0.0.1"),
        ),
        IpPool::with_namespace(
            "pool-v6",
            "metal",
            IpPoolSpec::new(64).with_range(AddressRange::from_subnet("2001:db8::/64")),
        ),
    ]
}

fn seed(store: &MemoryStore, nodes: usize) -> Vec<DataRequest> {
    store
        .insert_template(serde_yaml::from_str::<DataTemplate>(TEMPLATE).unwrap())
        .unwrap();
    for pool in pools() {
        store.insert_pool(pool).unwrap();
    }

    (0..nodes)
        .map(|i| {
            let machine = Machine::new(format!("machine-{}", i), "metal");
            let owner = OwnerReference::to_object(&TypeMeta::machine(), &machine.metadata, true);
            let mut infra =
                InfraMachine::new(format!("m3m-{}", i), "metal").with_host(format!("host-{}", i));
            infra.metadata.owner_references.push(owner);

            store.insert_machine(machine).unwrap();
            store.insert_infra_machine(infra).unwrap();
            store
                .insert_host(
                    Host::new(format!("host-{}", i), "metal")
                        .with_nic("eth0", format!("00:11:22:33:44:{:02x}", i)),
                )
                .unwrap();

            DataRequest::new(format!("node-{}", i), "metal", "workers", i as i64)
                .with_infra_machine(format!("m3m-{}", i))
        })
        .collect()
}

/// Lowest address of the pool's ranges that no record holds yet
fn next_free(spec: &IpPoolSpec, used: &HashSet<String>) -> Option<String> {
    for range in &spec.ranges {
        for offset in 0i64.. {
            match compute_address(range, offset) {
                Ok(ip) if used.contains(&ip.to_string()) => continue,
                Ok(ip) => return Some(ip.to_string()),
                Err(AddressError::OutOfRange { .. }) | Err(AddressError::AddressOverflow { .. }) => {
                    break
                }
                Err(e) => panic!("invalid pool range: {}", e),
            }
        }
    }
    None
}

/// Answer every open claim: an address record, or an empty allocation once
/// the pool is full
async fn allocate(store: &MemoryStore) {
    for mut pool in store.list_pools().unwrap() {
        let namespace = pool.metadata.namespace().to_string();
        let mut used = HashSet::new();
        for record in pool.status.allocations.values().filter(|r| !r.is_empty()) {
            if let Some(address) = store.get_address(&namespace, record).await.unwrap() {
                used.insert(address.spec.address);
            }
        }

        let claimants: Vec<String> = pool
            .metadata
            .owner_references
            .iter()
            .filter(|owner| owner.kind == KIND_DATA_REQUEST)
            .map(|owner| owner.name.clone())
            .collect();

        let mut changed = false;
        for claimant in claimants {
            if pool.status.allocations.contains_key(&claimant) {
                continue;
            }
            let record = match next_free(&pool.spec, &used) {
                Some(address) => {
                    let name = format!("{}-{}", pool.metadata.name, claimant);
                    store
                        .insert_address(
                            IpAddressRecord::new(
                                name.clone(),
                                IpAddressSpec {
                                    address: address.clone(),
                                    prefix: pool.spec.prefix,
                                    gateway: pool.spec.gateway.clone(),
                                    pool: pool.metadata.name.clone(),
                                    claim: claimant.clone(),
                                },
                            )
                            .with_namespace(namespace.clone()),
                        )
                        .unwrap();
                    used.insert(address);
                    name
                }
                None => String::new(),
            };
            pool.status.allocations.insert(claimant, record);
            changed = true;
        }

        if changed {
            store.insert_pool(pool).unwrap();
        }
    }
}

fn meta_data(document: &dragonfly_crd::BootDocument) -> BTreeMap<String, String> {
    serde_yaml::from_str(document.get(META_DATA_KEY).unwrap()).unwrap()
}

#[tokio::test]
async fn test_claim_allocate_render_release() {
    let store = Arc::new(MemoryStore::new());
    let mut requests = seed(&store, 3);
    let manager = DataManager::new(store.clone(), store.clone());

    // first pass only registers claims
    for request in requests.iter_mut() {
        let outcome = manager.reconcile(request).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));
        assert_eq!(request.status.phase, DataPhase::PendingPools);
    }
    let pool_a = store.get_pool("metal", "pool-a").await.unwrap().unwrap();
    assert_eq!(pool_a.metadata.owner_references.len(), 3);
    assert!(store.list_documents().unwrap().is_empty());

    // pool-a holds two addresses, so the third claimant is turned away
    allocate(&store).await;

    let mut outcomes = Vec::new();
    for request in requests.iter_mut() {
        outcomes.push(manager.reconcile(request).await);
    }
    assert_eq!(outcomes[0].as_ref().unwrap(), &ReconcileOutcome::Ready);
    assert_eq!(outcomes[1].as_ref().unwrap(), &ReconcileOutcome::Ready);
    assert!(matches!(outcomes[2], Err(DataError::PoolExhausted(ref pool)) if pool == "pool-a"));
    assert_eq!(requests[2].status.phase, DataPhase::Errored);
    assert!(requests[2]
        .status
        .error_message
        .as_deref()
        .unwrap()
        .contains("pool exhausted"));

    let meta = store.get_document("metal", "m3m-1-metadata").await.unwrap().unwrap();
    let values = meta_data(&meta);
    assert_eq!(values["hostname"], "node-1");
    assert_eq!(values["machine"], "machine-1");
    assert_eq!(values["local-ipv4"], "10.0.0.11");

    let network = store
        .get_document("metal", "m3m-0-networkdata")
        .await
        .unwrap()
        .unwrap();
    let network: serde_yaml::Value =
        serde_yaml::from_str(network.get(NETWORK_DATA_KEY).unwrap()).unwrap();
    assert_eq!(network["networks"][0]["ip_address"].as_str(), Some("10.0.0.10"));
    assert_eq!(network["networks"][0]["netmask"].as_str(), Some("255.255.255.0"));
    assert_eq!(network["networks"][0]["routes"][0]["gateway"].as_str(), Some("10.0.0.1"));
    assert_eq!(network["networks"][1]["ip_address"].as_str(), Some("2001:db8::1"));
    assert_eq!(network["networks"][1]["netmask"].as_str(), Some("ffff:ffff:ffff:ffff::"));
    assert_eq!(network["services"][0]["address"].as_str(), Some("10.0.0.2"));

    // a further pass leaves the stored documents alone
    let before = store.get_document("metal", "m3m-0-metadata").await.unwrap().unwrap();
    assert_eq!(
        manager.reconcile(&mut requests[0]).await.unwrap(),
        ReconcileOutcome::Ready
    );
    let after = store.get_document("metal", "m3m-0-metadata").await.unwrap().unwrap();
    assert_eq!(before.metadata.resource_version, after.metadata.resource_version);

    // teardown
    assert_eq!(manager.release(&requests[0]).await.unwrap(), ReleaseOutcome::Released);
    assert_eq!(manager.release(&requests[0]).await.unwrap(), ReleaseOutcome::Released);
    for name in ["pool-a", "pool-v6"] {
        let pool = store.get_pool("metal", name).await.unwrap().unwrap();
        assert!(!pool.is_claimed_by(&requests[0].owner_reference(false)));
        assert!(pool.is_claimed_by(&requests[1].owner_reference(false)));
    }
}

#[tokio::test]
async fn test_concurrent_reconciles() {
    let store = Arc::new(MemoryStore::new());
    let requests = seed(&store, 2);
    let manager = Arc::new(DataManager::new(store.clone(), store.clone()));

    // claims race on the same pools; losers simply wait for the next pass
    for _ in 0..3 {
        let mut handles = Vec::new();
        for request in requests.iter().cloned() {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let mut request = request;
                manager.reconcile(&mut request).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    let pool_a = store.get_pool("metal", "pool-a").await.unwrap().unwrap();
    for request in &requests {
        assert!(pool_a.is_claimed_by(&request.owner_reference(false)));
    }

    allocate(&store).await;
    for mut request in requests {
        assert_eq!(
            manager.reconcile(&mut request).await.unwrap(),
            ReconcileOutcome::Ready
        );
    }
    assert_eq!(store.list_documents().unwrap().len(), 4);
}
