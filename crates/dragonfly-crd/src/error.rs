use thiserror::Error;

/// Resource validation failures
#[derive(Debug, Error)]
pub enum CrdError {
    #[error("invalid MAC address: {0}")]
    InvalidMacAddress(String),

    /// A field the resource cannot be reconciled without
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid {field}: {message}")]
    InvalidFieldValue { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, CrdError>;
