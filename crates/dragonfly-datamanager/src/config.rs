//! Data manager configuration

use dragonfly_crd::CLUSTER_NAME_LABEL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Data manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Delay before a request waiting on pools or objects is reconciled again
    pub requeue_after_secs: u64,

    /// Deadline for a single reconcile pass
    pub reconcile_timeout_secs: u64,

    /// Template label copied onto rendered documents
    pub cluster_label: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            requeue_after_secs: 30,
            reconcile_timeout_secs: 60,
            cluster_label: CLUSTER_NAME_LABEL.to_string(),
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requeue delay
    pub fn with_requeue_after(mut self, delay: Duration) -> Self {
        self.requeue_after_secs = delay.as_secs();
        self
    }

    /// Set the reconcile deadline
    pub fn with_reconcile_timeout(mut self, timeout: Duration) -> Self {
        self.reconcile_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_cluster_label(mut self, label: impl Into<String>) -> Self {
        self.cluster_label = label.into();
        self
    }

    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_after_secs)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.requeue_after(), Duration::from_secs(30));
        assert_eq!(config.reconcile_timeout(), Duration::from_secs(60));
        assert_eq!(config.cluster_label, "cluster.x-k8s.io/cluster-name");
    }

    #[test]
    fn test_builder() {
        let config = ManagerConfig::new()
            .with_requeue_after(Duration::from_secs(5))
            .with_reconcile_timeout(Duration::from_secs(10))
            .with_cluster_label("example.com/cluster");
        assert_eq!(config.requeue_after_secs, 5);
        assert_eq!(config.reconcile_timeout_secs, 10);
        assert_eq!(config.cluster_label, "example.com/cluster");
    }

    #[test]
    fn test_partial_yaml() {
        let config: ManagerConfig = serde_yaml::from_str("requeue_after_secs: 5\n").unwrap();
        assert_eq!(config.requeue_after_secs, 5);
        assert_eq!(config.reconcile_timeout_secs, 60);
    }
}
