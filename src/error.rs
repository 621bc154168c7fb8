//! Unified error handling for the statuswatch crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`StatusWatchErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! Steady-state monitoring has no fatal error path: providers and consumers
//! log their failures and carry on. These types surface at setup time and
//! at the edges (configuration, registration, HTTP clients).

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::consumers::ConsumerError;
pub use crate::providers::{ProviderError, RegistryError};
pub use crate::scheduler::error::SchedulerError;

/// Common trait for all statuswatch error types
pub trait StatusWatchErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout)
    Network,
    /// Feed parsing and serialization errors
    Parsing,
    /// Configuration and validation errors
    Config,
    /// Worker scheduling errors
    Scheduler,
    /// Event consumer errors
    Consumer,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Consumer => "consumer",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the statuswatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Provider adapter errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Provider registration errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Consumer errors
    #[error("Consumer error: {0}")]
    Consumer(#[from] ConsumerError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StatusWatchErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Provider(e) => e.is_recoverable(),
            Self::Registry(_) => false,
            Self::Consumer(e) => matches!(e, ConsumerError::Http(_)),
            Self::Config(_) => false,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Http(_) => true, // HTTP errors are often transient
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Provider(ProviderError::Parse(_)) | Self::Json(_) => ErrorCategory::Parsing,
            Self::Provider(_) | Self::Http(_) => ErrorCategory::Network,
            Self::Scheduler(SchedulerError::InvalidConcurrency { .. }) => ErrorCategory::Config,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Registry(_) | Self::Config(_) => ErrorCategory::Config,
            Self::Consumer(ConsumerError::InvalidConfig(_)) => ErrorCategory::Config,
            Self::Consumer(_) => ErrorCategory::Consumer,
            Self::Io(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
