//! Request reconciliation
//!
//! One reconcile pass takes a [`DataRequest`] as far as it can go:
//!
//! 1. Fetch the template. A template without sections needs no documents.
//! 2. Skip everything if the documents already exist; they are never
//!    regenerated.
//! 3. Claim and resolve pool addresses, waiting for the allocator if needed.
//! 4. Fetch the node objects, render every missing document, then create
//!    them.
//!
//! Waiting ends the pass with [`ReconcileOutcome::RequeueAfter`]. Terminal
//! errors are recorded on the request status; store failures and timeouts
//! are only returned.

use crate::config::ManagerConfig;
use crate::error::{DataError, Result};
use crate::release::{ReleaseCoordinator, ReleaseOutcome};
use crate::resolver::PoolResolver;
use crate::store::{DataStore, NodeLookup, StoreError};
use dragonfly_crd::{
    BootDocument, DataRequest, DataTemplate, DocumentRef, ObjectRef, META_DATA_KEY,
    NETWORK_DATA_KEY,
};
use dragonfly_metadata::{
    render_meta_data, render_network_data, to_yaml, NodeAttributes, PoolCache,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of a reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Every document the template describes exists
    Ready,
    /// Something is not there yet; reconcile again after the delay
    RequeueAfter(Duration),
}

/// What a pass ended on, before it is mapped onto the request status
enum Pass {
    Ready,
    WaitingForPools,
    WaitingForObjects,
}

/// A document the template describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    MetaData,
    NetworkData,
}

impl DocumentKind {
    fn key(self) -> &'static str {
        match self {
            DocumentKind::MetaData => META_DATA_KEY,
            DocumentKind::NetworkData => NETWORK_DATA_KEY,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            DocumentKind::MetaData => "metadata",
            DocumentKind::NetworkData => "networkdata",
        }
    }
}

#[derive(Debug, Clone)]
struct DocumentTarget {
    kind: DocumentKind,
    name: String,
    namespace: String,
}

/// Reconciles data requests into rendered boot documents
pub struct DataManager {
    store: Arc<dyn DataStore>,
    nodes: Arc<dyn NodeLookup>,
    config: ManagerConfig,
}

impl DataManager {
    /// Create a data manager with the default configuration
    pub fn new(store: Arc<dyn DataStore>, nodes: Arc<dyn NodeLookup>) -> Self {
        Self {
            store,
            nodes,
            config: ManagerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Run one reconcile pass and update `request.status`.
    ///
    /// The caller persists the request afterwards.
    pub async fn reconcile(&self, request: &mut DataRequest) -> Result<ReconcileOutcome> {
        let name = request.name().to_string();
        info!(request = %name, "Reconciling data request");

        request.clear_error();

        let timeout = self.config.reconcile_timeout();
        let result = match tokio::time::timeout(timeout, self.reconcile_pass(request)).await {
            Ok(result) => result,
            Err(_) => Err(DataError::Timeout(timeout)),
        };

        match result {
            Ok(Pass::Ready) => {
                request.set_ready();
                info!(request = %name, "Data request ready");
                Ok(ReconcileOutcome::Ready)
            }
            Ok(Pass::WaitingForPools) => {
                request.set_pending();
                Ok(ReconcileOutcome::RequeueAfter(self.config.requeue_after()))
            }
            Ok(Pass::WaitingForObjects) => Ok(ReconcileOutcome::RequeueAfter(self.config.requeue_after())),
            Err(e) if e.is_terminal() => {
                error!(request = %name, error = %e, "Data request failed");
                request.set_error(e.to_string());
                Err(e)
            }
            Err(e) => {
                warn!(request = %name, error = %e, "Reconcile interrupted");
                Err(e)
            }
        }
    }

    /// Release the pool claims held by `request`
    pub async fn release(&self, request: &DataRequest) -> Result<ReleaseOutcome> {
        let Some(template) = self.fetch_template(request).await? else {
            warn!(request = %request.name(), "Template not found, nothing to release");
            return Ok(ReleaseOutcome::Released);
        };

        ReleaseCoordinator::new(self.store.clone())
            .release(request, &template)
            .await
    }

    async fn fetch_template(&self, request: &DataRequest) -> Result<Option<DataTemplate>> {
        let Some(template_ref) = &request.spec.template else {
            return Ok(None);
        };
        let namespace = template_ref.namespace_or(request.namespace());
        Ok(self.store.get_template(namespace, &template_ref.name).await?)
    }

    async fn reconcile_pass(&self, request: &mut DataRequest) -> Result<Pass> {
        request.validate()?;

        if request.spec.template.is_none() {
            debug!(request = %request.name(), "No template referenced");
            return Ok(Pass::Ready);
        }

        let Some(template) = self.fetch_template(request).await? else {
            debug!(request = %request.name(), "Template not found yet");
            return Ok(Pass::WaitingForObjects);
        };

        if !template.has_sections() {
            return Ok(Pass::Ready);
        }

        let targets = document_targets(request, &template)?;
        record_document_refs(request, &targets);
        let request = &*request;

        let mut missing = Vec::new();
        for target in targets {
            if self
                .store
                .get_document(&target.namespace, &target.name)
                .await?
                .is_none()
            {
                missing.push(target);
            }
        }
        if missing.is_empty() {
            debug!(request = %request.name(), "Documents already exist");
            return Ok(Pass::Ready);
        }

        let resolution = PoolResolver::new(self.store.clone())
            .resolve(request, &template)
            .await?;
        if resolution.needs_retry {
            return Ok(Pass::WaitingForPools);
        }

        let Some(documents) = self
            .render_documents(request, &template, &resolution.pools, &missing)
            .await?
        else {
            return Ok(Pass::WaitingForObjects);
        };

        for document in &documents {
            match self.store.create_document(document).await {
                Ok(()) => {
                    info!(
                        request = %request.name(),
                        document = %document.metadata.name,
                        "Created boot document"
                    );
                }
                Err(StoreError::AlreadyExists(_)) => {
                    debug!(
                        request = %request.name(),
                        document = %document.metadata.name,
                        "Boot document already written"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Pass::Ready)
    }

    /// Render the `missing` documents. `None` while a node object is not
    /// available yet.
    async fn render_documents(
        &self,
        request: &DataRequest,
        template: &DataTemplate,
        pools: &PoolCache,
        missing: &[DocumentTarget],
    ) -> Result<Option<Vec<BootDocument>>> {
        let infra_ref = infra_machine_ref(request)?;
        let infra_namespace = infra_ref.namespace_or(request.namespace());

        let Some(infra_machine) = self
            .store
            .get_infra_machine(infra_namespace, &infra_ref.name)
            .await?
        else {
            debug!(request = %request.name(), machine = %infra_ref.name, "Infrastructure machine not found yet");
            return Ok(None);
        };
        let Some(machine) = self.nodes.owner_machine(&infra_machine).await? else {
            debug!(request = %request.name(), "Owner machine not set yet");
            return Ok(None);
        };
        let Some(host) = self.nodes.host_for(&infra_machine).await? else {
            debug!(request = %request.name(), "Host not associated yet");
            return Ok(None);
        };
        let node = NodeAttributes::new(&infra_machine, &machine, &host);

        let mut documents = Vec::with_capacity(missing.len());
        for target in missing {
            let payload = match target.kind {
                DocumentKind::MetaData => match &template.spec.meta_data {
                    Some(section) => to_yaml(&render_meta_data(request, section, pools, &node)?)?,
                    None => continue,
                },
                DocumentKind::NetworkData => match &template.spec.network_data {
                    Some(section) => to_yaml(&render_network_data(section, pools, &host)?)?,
                    None => continue,
                },
            };
            documents.push(self.document(request, template, target, payload));
        }
        Ok(Some(documents))
    }

    fn document(
        &self,
        request: &DataRequest,
        template: &DataTemplate,
        target: &DocumentTarget,
        payload: String,
    ) -> BootDocument {
        let mut document = BootDocument::new(target.name.clone(), target.namespace.clone())
            .with_data(target.kind.key(), payload);
        document
            .metadata
            .owner_references
            .push(request.owner_reference(true));
        if let Some(cluster) = template.metadata.labels.get(&self.config.cluster_label) {
            document
                .metadata
                .labels
                .insert(self.config.cluster_label.clone(), cluster.clone());
        }
        document
    }
}

/// Documents the template describes, with their names defaulted.
///
/// Documents always live in the request's namespace; a namespace on an
/// explicit reference is ignored.
fn document_targets(request: &DataRequest, template: &DataTemplate) -> Result<Vec<DocumentTarget>> {
    let sections = [
        (
            DocumentKind::MetaData,
            template.spec.meta_data.is_some(),
            &request.spec.meta_data,
        ),
        (
            DocumentKind::NetworkData,
            template.spec.network_data.is_some(),
            &request.spec.network_data,
        ),
    ];

    let mut targets = Vec::new();
    for (kind, present, document_ref) in sections {
        if !present {
            continue;
        }
        let name = match document_ref {
            Some(document) if !document.name.is_empty() => document.name.clone(),
            _ => format!("{}-{}", infra_machine_ref(request)?.name, kind.suffix()),
        };
        targets.push(DocumentTarget {
            kind,
            name,
            namespace: request.namespace().to_string(),
        });
    }
    Ok(targets)
}

/// Pin the resolved document names on the request
fn record_document_refs(request: &mut DataRequest, targets: &[DocumentTarget]) {
    for target in targets {
        let document = Some(DocumentRef::new(target.name.clone(), target.namespace.clone()));
        match target.kind {
            DocumentKind::MetaData => request.spec.meta_data = document,
            DocumentKind::NetworkData => request.spec.network_data = document,
        }
    }
}

fn infra_machine_ref(request: &DataRequest) -> Result<&ObjectRef> {
    request
        .spec
        .infra_machine
        .as_ref()
        .ok_or_else(|| DataError::MissingField("spec.infraMachine".to_string()))
}
