use thiserror::Error;

/// Failure of a durable-store call, independent of the backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store did not answer in time or could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// The store rejected the write because of a uniqueness or state constraint.
    #[error("Store conflict: {0}")]
    Conflict(String),

    #[error("Store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}
