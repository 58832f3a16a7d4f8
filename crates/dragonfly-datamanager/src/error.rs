//! Error types for boot data reconciliation

use crate::store::StoreError;
use dragonfly_crd::CrdError;
use dragonfly_metadata::RenderError;
use std::time::Duration;
use thiserror::Error;

/// Error type for reconciliation.
///
/// Waiting on the allocator or on objects that do not exist yet is not an
/// error; it is reported through [`ReconcileOutcome`](crate::ReconcileOutcome)
/// and [`ReleaseOutcome`](crate::ReleaseOutcome).
#[derive(Debug, Error)]
pub enum DataError {
    /// The template cannot be rendered for this machine
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// The allocator gave up on the claim
    #[error("{0}: unable to allocate IP address, pool exhausted")]
    PoolExhausted(String),

    /// A field needed to reconcile the request is not set
    #[error("missing field: {0}")]
    MissingField(String),

    /// The request itself is invalid
    #[error("invalid resource: {0}")]
    Resource(#[from] CrdError),

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The reconcile deadline passed
    #[error("reconcile timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DataError {
    /// Terminal errors are recorded on the request; retrying without a
    /// change to the template or the pools cannot succeed.
    pub fn is_terminal(&self) -> bool {
        match self {
            DataError::Render(_)
            | DataError::PoolExhausted(_)
            | DataError::MissingField(_)
            | DataError::Resource(_) => true,
            DataError::Store(_) | DataError::Timeout(_) | DataError::Serialization(_) => false,
        }
    }
}

/// Result type for reconciliation
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::PoolExhausted("pool-a".to_string());
        assert_eq!(
            err.to_string(),
            "pool-a: unable to allocate IP address, pool exhausted"
        );

        let err = DataError::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "reconcile timed out after 60s");
    }

    #[test]
    fn test_error_classes() {
        assert!(DataError::PoolExhausted("pool-a".to_string()).is_terminal());
        assert!(DataError::MissingField("spec.infraMachine".to_string()).is_terminal());
        assert!(DataError::Render(RenderError::UnknownObjectKind("x".to_string())).is_terminal());
        assert!(!DataError::Store(StoreError::Database("down".to_string())).is_terminal());
        assert!(!DataError::Timeout(Duration::from_secs(1)).is_terminal());
    }
}
