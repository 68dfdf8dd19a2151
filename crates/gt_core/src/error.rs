use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the ingestion pipeline and standings queries.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The match outcome violated a model invariant. Raised before any
    /// persistence happens, so a rejected match leaves no partial writes.
    #[error("invalid match: {0}")]
    InvalidMatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store failures are propagated unchanged and never retried here.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
