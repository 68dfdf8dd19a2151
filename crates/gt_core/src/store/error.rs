use thiserror::Error;

/// Error code document stores commonly attach to queries that need an
/// index which is missing or still building.
pub const INDEX_UNAVAILABLE_CODE: &str = "FAILED_PRECONDITION";

#[derive(Error, Debug)]
pub enum StoreError {
    /// Opaque backend failure (network, permission, missing index, ...).
    /// `code` is the driver's error code when it reported one.
    #[error("backend error: {message}")]
    Backend {
        code: Option<String>,
        message: String,
    },

    #[error("document {collection}/{id} not found")]
    Missing { collection: String, id: String },

    /// A conditional write lost the race: the stored revision moved
    /// between read and write.
    #[error("revision conflict on {collection}/{id}")]
    RevisionConflict { collection: String, id: String },

    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            code: None,
            message: message.into(),
        }
    }

    /// Whether this failure is the "index missing or still building"
    /// class of query error, recognized by error code or message
    /// substring. Only this classification may trigger the standings
    /// fallback path; every other error must propagate unchanged.
    pub fn is_index_unavailable(&self) -> bool {
        match self {
            StoreError::Backend { code, message } => {
                if code.as_deref() == Some(INDEX_UNAVAILABLE_CODE) {
                    return true;
                }
                let message = message.to_ascii_lowercase();
                message.contains("index")
                    && (message.contains("missing")
                        || message.contains("building")
                        || message.contains("not ready")
                        || message.contains("requires"))
            }
            _ => false,
        }
    }

    pub fn is_revision_conflict(&self) -> bool {
        matches!(self, StoreError::RevisionConflict { .. })
    }
}
