//! Provider polling scheduler
//!
//! This module drives every registered provider on its own cadence while
//! bounding how many fetches hit the network at once.
//!
//! # Overview
//!
//! The scheduler spawns one [`ProviderWorker`] task per provider. All
//! workers share:
//!
//! - **Admission semaphore**: caps fetches in flight at the configured
//!   concurrency limit. A permit is held only for the duration of a fetch.
//! - **Dedup store**: admits each `(provider, id)` pair exactly once.
//! - **Event bus**: fans new events out to every subscribed consumer.
//! - **Shutdown signal**: a `watch` channel raced against every wait, so
//!   workers stop promptly in any state.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  ┌──────────┐  ┌──────────┐
//!  │ Worker A │  │ Worker B │  │ Worker C │   one task per provider
//!  └────┬─────┘  └────┬─────┘  └────┬─────┘
//!       │  acquire    │             │
//!       ▼             ▼             ▼
//!  ┌─────────────────────────────────────┐
//!  │      Semaphore (concurrency N)      │   held around fetch only
//!  └─────────────────────────────────────┘
//!       │ fetch → dedup filter → publish
//!       ▼
//!  ┌─────────────────────────────────────┐
//!  │              EventBus               │──► consumer queues
//!  └─────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`worker`] - Per-provider cycle and state machine
//! - [`error`] - Scheduler error types
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use statuswatch::bus::EventBus;
//! use statuswatch::config::SchedulerConfig;
//! use statuswatch::providers::ProviderRegistry;
//! use statuswatch::scheduler::Scheduler;
//! use statuswatch::storage::DeduplicationStore;
//!
//! let scheduler = Scheduler::new(
//!     registry,
//!     Arc::new(DeduplicationStore::new()),
//!     Arc::new(EventBus::unbounded()),
//!     &SchedulerConfig::default(),
//! )?;
//!
//! let summaries = scheduler.run().await?;
//! ```

pub mod error;
pub mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::bus::EventBus;
use crate::config::SchedulerConfig;
use crate::providers::ProviderRegistry;
use crate::storage::DeduplicationStore;
use crate::utils::panic_message;

pub use error::{SchedulerError, SchedulerResult};
pub use worker::{ProviderWorker, WorkerState, WorkerSummary};

/// Resolve once shutdown has been requested
///
/// A dropped sender counts as a shutdown request.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Runs one polling worker per registered provider
pub struct Scheduler {
    registry: ProviderRegistry,
    dedup: Arc<DeduplicationStore>,
    bus: Arc<EventBus>,
    semaphore: Arc<Semaphore>,
    concurrency_limit: usize,
    shutdown: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    /// Create a scheduler over the given providers and shared components
    pub fn new(
        registry: ProviderRegistry,
        dedup: Arc<DeduplicationStore>,
        bus: Arc<EventBus>,
        config: &SchedulerConfig,
    ) -> SchedulerResult<Self> {
        let limit = config.concurrency_limit;
        if limit == 0 || limit > Semaphore::MAX_PERMITS {
            return Err(SchedulerError::invalid_concurrency(limit));
        }

        let (shutdown, shutdown_rx) = watch::channel(false);

        Ok(Self {
            registry,
            dedup,
            bus,
            semaphore: Arc::new(Semaphore::new(limit)),
            concurrency_limit: limit,
            shutdown,
            shutdown_rx,
        })
    }

    /// Spawn every worker and wait until all of them stop
    ///
    /// Workers only stop on [`Scheduler::stop`], so this resolves after
    /// shutdown. Summaries come back in registration order. A worker task
    /// that dies abnormally is logged and left out.
    pub async fn run(&self) -> SchedulerResult<Vec<WorkerSummary>> {
        let providers = self.registry.providers();
        if providers.is_empty() {
            tracing::warn!("No providers registered, scheduler has nothing to run");
            return Ok(Vec::new());
        }

        tracing::info!(
            providers = providers.len(),
            concurrency_limit = self.concurrency_limit,
            "Starting scheduler"
        );

        let mut workers = JoinSet::new();
        let mut pending: HashMap<usize, String> = HashMap::with_capacity(providers.len());

        for (index, provider) in providers.into_iter().enumerate() {
            pending.insert(index, provider.name().to_string());
            let worker = ProviderWorker::new(
                provider,
                Arc::clone(&self.semaphore),
                Arc::clone(&self.dedup),
                Arc::clone(&self.bus),
            );
            let shutdown = self.shutdown_rx.clone();
            workers.spawn(async move { (index, worker.run(shutdown).await) });
        }

        let mut summaries = Vec::with_capacity(pending.len());
        let mut failures = Vec::new();

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, summary)) => {
                    pending.remove(&index);
                    summaries.push((index, summary));
                }
                Err(e) if e.is_panic() => failures.push(panic_message(e.into_panic().as_ref())),
                Err(e) => failures.push(e.to_string()),
            }
        }

        // Whatever is still pending belongs to the failed tasks
        let reason = failures.join("; ");
        for provider in pending.into_values() {
            let err = SchedulerError::worker_join(provider, reason.clone());
            tracing::error!(error = %err, "Worker task failed");
        }

        summaries.sort_by_key(|(index, _)| *index);
        tracing::info!(workers = summaries.len(), "Scheduler stopped");

        Ok(summaries.into_iter().map(|(_, summary)| summary).collect())
    }

    /// Signal every worker to stop
    pub fn stop(&self) {
        tracing::info!("Scheduler shutdown requested");
        self.shutdown.send_replace(true);
    }

    /// Whether shutdown has been signalled
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Shutdown signal shared with workers, for components that should
    /// stop together with them
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Permits currently free on the admission semaphore
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn provider_count(&self) -> usize {
        self.registry.len()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("providers", &self.registry.names())
            .field("concurrency_limit", &self.concurrency_limit)
            .field("available_permits", &self.available_permits())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
