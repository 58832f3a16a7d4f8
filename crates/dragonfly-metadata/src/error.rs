//! Error types for document rendering

use dragonfly_ipam::AddressError;
use thiserror::Error;

/// Error type for rendering operations
#[derive(Debug, Error)]
pub enum RenderError {
    /// Object selector is not one of machine, infraMachine or host
    #[error("unknown object kind: {0}")]
    UnknownObjectKind(String),

    /// Host inspection has not reported any NICs yet
    #[error("host {0} has no inspected NICs")]
    NicsNotPopulated(String),

    /// No NIC with the requested name
    #[error("interface {interface} not found on host {host}")]
    InterfaceNotFound { interface: String, host: String },

    /// Pool referenced by the template has no resolved address
    #[error("pool {0} not resolved")]
    PoolNotResolved(String),

    #[error(transparent)]
    Address(#[from] AddressError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

/// Result type for rendering operations
pub type Result<T> = std::result::Result<T, RenderError>;
