//! statuswatch - Concurrent status page monitor
//!
//! Polls third-party status pages, keeps only incidents it has not seen
//! before, and fans them out to independent consumers.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`providers`] - Status page adapters and the provider registry
//! - [`scheduler`] - One polling worker per provider behind an admission semaphore
//! - [`storage`] - Deduplication store
//! - [`bus`] - Fan-out distribution with per-subscriber queues
//! - [`consumers`] - Console and webhook sinks
//! - [`monitor`] - Wiring everything together from a [`config::Config`]
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use statuswatch::config::Config;
//! use statuswatch::monitor::StatusMonitor;
//! use statuswatch::providers::OpenAIProvider;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let mut monitor = StatusMonitor::new(config);
//!     monitor.register_provider(OpenAIProvider::new(reqwest::Client::new()))?;
//!     monitor.add_configured_consumers()?;
//!
//!     let report = monitor
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     println!("published {} events", report.events_published);
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod config;
pub mod consumers;
pub mod error;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod providers;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bus::{EventBus, Subscription};
    pub use crate::config::Config;
    pub use crate::consumers::{EventConsumer, run_consumer, spawn_consumer};
    pub use crate::error::{Error, ErrorCategory, Result, StatusWatchErrorTrait};
    pub use crate::models::StatusEvent;
    pub use crate::monitor::{MonitorReport, StatusMonitor};
    pub use crate::providers::{ProviderRegistry, StatusProvider};
    pub use crate::scheduler::{Scheduler, WorkerState, WorkerSummary};
    pub use crate::storage::DeduplicationStore;
}

// Direct re-exports for convenience
pub use models::{DedupKey, StatusEvent};
