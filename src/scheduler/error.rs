//! Error types for the scheduler module

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// Concurrency limit must admit at least one fetch
    #[error("Invalid concurrency limit '{limit}'. Must be at least 1")]
    InvalidConcurrency { limit: usize },

    /// The admission semaphore was closed underneath a worker
    #[error("Admission semaphore closed while worker '{provider}' was waiting")]
    SemaphoreClosed { provider: String },

    /// A worker task ended abnormally
    #[error("Worker task for '{provider}' failed: {reason}")]
    WorkerJoin { provider: String, reason: String },
}

impl SchedulerError {
    /// Create an invalid concurrency error
    pub fn invalid_concurrency(limit: usize) -> Self {
        Self::InvalidConcurrency { limit }
    }

    /// Create a worker join error
    pub fn worker_join(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerJoin {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WorkerJoin { .. })
    }
}
