//! Per-provider polling worker
//!
//! Each registered provider gets one [`ProviderWorker`] running on its own
//! task. A cycle moves through the states below and every wait along the
//! way is raced against the shutdown signal:
//!
//! ```text
//! Idle ──► Fetching ──► Filtering ──► Publishing ──► Sleeping ──► Idle
//!   │          │                          │              │
//!   └──────────┴──────────────────────────┴──────────────┴──► Cancelled
//! ```
//!
//! The admission permit is held only while the provider's fetch is in
//! progress.

use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};

use super::error::SchedulerError;
use super::shutdown_requested;
use crate::bus::EventBus;
use crate::metrics;
use crate::models::StatusEvent;
use crate::providers::StatusProvider;
use crate::storage::DeduplicationStore;
use crate::utils::panic_message;

/// Lifecycle state of a provider worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting for an admission permit
    Idle,
    /// Holding a permit while the provider fetches
    Fetching,
    /// Checking fetched events against the dedup store
    Filtering,
    /// Handing new events to the bus
    Publishing,
    /// Waiting out the poll interval
    Sleeping,
    /// Stopped by shutdown
    Cancelled,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Filtering => "filtering",
            Self::Publishing => "publishing",
            Self::Sleeping => "sleeping",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters reported by a worker when it stops
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub provider: String,
    /// Fetches started
    pub cycles: u64,
    pub events_fetched: u64,
    pub events_published: u64,
    pub duplicates: u64,
    /// Fetches that panicked and were treated as empty
    pub fetch_faults: u64,
    pub final_state: WorkerState,
}

/// Polling loop for one provider
pub struct ProviderWorker {
    provider: Arc<dyn StatusProvider>,
    name: String,
    poll_interval: Duration,
    semaphore: Arc<Semaphore>,
    dedup: Arc<DeduplicationStore>,
    bus: Arc<EventBus>,
    state: WorkerState,
    cycles: u64,
    events_fetched: u64,
    events_published: u64,
    duplicates: u64,
    fetch_faults: u64,
}

impl ProviderWorker {
    pub fn new(
        provider: Arc<dyn StatusProvider>,
        semaphore: Arc<Semaphore>,
        dedup: Arc<DeduplicationStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        let name = provider.name().to_string();
        let poll_interval = provider.poll_interval();

        Self {
            provider,
            name,
            poll_interval,
            semaphore,
            dedup,
            bus,
            state: WorkerState::Idle,
            cycles: 0,
            events_fetched: 0,
            events_published: 0,
            duplicates: 0,
            fetch_faults: 0,
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run cycles until shutdown is signalled
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> WorkerSummary {
        tracing::info!(
            provider = %self.name,
            interval_secs = self.poll_interval.as_secs_f64(),
            "Worker started"
        );

        while self.run_cycle(&mut shutdown).await.is_continue() {}

        self.state = WorkerState::Cancelled;
        tracing::info!(
            provider = %self.name,
            cycles = self.cycles,
            published = self.events_published,
            "Worker stopped"
        );

        self.summary()
    }

    /// Snapshot of the worker's counters
    pub fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            provider: self.name.clone(),
            cycles: self.cycles,
            events_fetched: self.events_fetched,
            events_published: self.events_published,
            duplicates: self.duplicates,
            fetch_faults: self.fetch_faults,
            final_state: self.state,
        }
    }

    async fn run_cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> ControlFlow<()> {
        self.state = WorkerState::Idle;

        let semaphore = Arc::clone(&self.semaphore);
        let permit = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => return ControlFlow::Break(()),
            permit = semaphore.acquire_owned() => permit,
        };
        let permit = match permit {
            Ok(permit) => permit,
            Err(_) => {
                let err = SchedulerError::SemaphoreClosed {
                    provider: self.name.clone(),
                };
                tracing::error!(error = %err, "Worker cannot continue");
                return ControlFlow::Break(());
            }
        };

        self.state = WorkerState::Fetching;
        self.cycles += 1;

        let provider = Arc::clone(&self.provider);
        let started = Instant::now();
        let outcome = {
            let _in_flight = metrics::fetch_started();
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => None,
                result = AssertUnwindSafe(provider.fetch_events()).catch_unwind() => Some(result),
            }
        };
        drop(permit);

        let Some(outcome) = outcome else {
            tracing::debug!(provider = %self.name, "Fetch abandoned on shutdown");
            return ControlFlow::Break(());
        };

        let elapsed = started.elapsed();
        let events = match outcome {
            Ok(events) => {
                metrics::record_fetch(&self.name, elapsed, false);
                events
            }
            Err(payload) => {
                self.fetch_faults += 1;
                metrics::record_fetch(&self.name, elapsed, true);
                tracing::error!(
                    provider = %self.name,
                    panic = %panic_message(payload.as_ref()),
                    "Fetch faulted, treating cycle as empty"
                );
                Vec::new()
            }
        };

        self.state = WorkerState::Filtering;
        let fetched = events.len();
        let fresh = self.filter_new(events);
        let duplicates = fetched - fresh.len();

        self.events_fetched += fetched as u64;
        self.duplicates += duplicates as u64;
        metrics::record_dedup_results(&self.name, fresh.len(), duplicates);

        tracing::debug!(
            provider = %self.name,
            fetched,
            new = fresh.len(),
            duplicates,
            elapsed_ms = elapsed.as_millis() as u64,
            "Fetch cycle complete"
        );

        self.state = WorkerState::Publishing;
        let bus = Arc::clone(&self.bus);
        for event in fresh {
            let published = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => false,
                _ = bus.publish(event) => true,
            };
            if !published {
                tracing::debug!(provider = %self.name, "Publish abandoned on shutdown");
                return ControlFlow::Break(());
            }
            self.events_published += 1;
            metrics::record_published(&self.name);
        }

        self.state = WorkerState::Sleeping;
        tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => ControlFlow::Break(()),
            _ = tokio::time::sleep(self.poll_interval) => ControlFlow::Continue(()),
        }
    }

    /// Keep only events the dedup store has not seen, in fetch order
    fn filter_new(&self, events: Vec<StatusEvent>) -> Vec<StatusEvent> {
        events
            .into_iter()
            .filter(|event| self.dedup.is_new_event(event))
            .collect()
    }
}
