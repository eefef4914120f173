use thiserror::Error;

/// Error taxonomy for the scan core.
///
/// Probe errors never escape the test runner: they are absorbed per endpoint
/// and logged. Persistence errors inside `execute()` surface only as the
/// `failed` lifecycle transition, never as a raised error to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
