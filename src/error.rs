//! Huginn error types

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Submission validation errors
    #[error("invalid batch id: batch_id is required and cannot be blank")]
    InvalidBatchId,

    #[error("batch '{0}' is already active")]
    DuplicateBatch(String),

    #[error("batch contains no items")]
    EmptyBatch,

    #[error("batch size ({size}) exceeds maximum allowed ({max})")]
    BatchTooLarge { size: usize, max: usize },

    #[error("invalid concurrency {0}: at least one worker is required")]
    InvalidConcurrency(usize),

    // Lookup errors
    #[error("batch not found: {0}")]
    BatchNotFound(String),

    #[error("cache instance not found: {0}")]
    CacheNotFound(String),

    #[error("unknown framework: {0}")]
    UnknownFramework(String),

    // Item processing errors
    #[error("analysis failed ({framework}): {message}")]
    Analysis { framework: String, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Storage errors
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HuginnError {
    /// Whether this error rejects a submission before any work starts.
    ///
    /// Validation errors are terminal and surfaced to the caller as-is;
    /// they are never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            HuginnError::InvalidBatchId
                | HuginnError::DuplicateBatch(_)
                | HuginnError::EmptyBatch
                | HuginnError::BatchTooLarge { .. }
                | HuginnError::InvalidConcurrency(_)
        )
    }

    /// Whether this error belongs to a single item and must stay inside
    /// the worker boundary.
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            HuginnError::Analysis { .. }
                | HuginnError::InvalidInput(_)
                | HuginnError::UnknownFramework(_)
        )
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
