//! Status page provider adapters
//!
//! A provider knows how to fetch one external status feed and normalise its
//! entries into [`StatusEvent`]s. The scheduler drives every provider on its
//! own cadence and never inspects feed formats itself.
//!
//! Adding a provider means implementing [`StatusProvider`] and registering
//! it with a [`ProviderRegistry`]; nothing in the scheduler changes.

pub mod openai;
pub mod registry;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::StatusEvent;

pub use openai::OpenAIProvider;
pub use registry::{ProviderRegistry, RegistryError};

/// Poll interval used by providers that do not override it
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Result type for adapter-internal operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors an adapter may hit while fetching or parsing
///
/// These never cross the [`StatusProvider`] boundary: adapters log them and
/// report an empty fetch instead.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, connect, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response with a status other than 200/304
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// Feed body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Check if the next scheduled poll may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::UnexpectedStatus(status) => *status >= 500 || *status == 429,
            Self::Parse(_) => false,
        }
    }
}

/// Capability every status source implements
///
/// `fetch_events` must not fail for ordinary network or parsing problems;
/// it returns an empty vector instead. Ids must be unique within one call.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Stable, unique provider name; also the dedup namespace
    fn name(&self) -> &str;

    /// Time between fetch cycles for this provider
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Fetch the latest incidents and return normalised events
    async fn fetch_events(&self) -> Vec<StatusEvent>;
}
