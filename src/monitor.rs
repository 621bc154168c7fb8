//! Process-level wiring
//!
//! [`StatusMonitor`] assembles the registry, dedup store, bus, scheduler and
//! consumers from a [`Config`] and runs them until a stop signal fires.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::bus::{BusStats, EventBus};
use crate::config::Config;
use crate::consumers::{
    spawn_consumer, ConsoleConsumer, ConsumerResult, ConsumerSummary, EventConsumer,
    WebhookConsumer,
};
use crate::error::{Error, Result};
use crate::providers::{ProviderRegistry, RegistryError, StatusProvider};
use crate::scheduler::{Scheduler, WorkerSummary};
use crate::storage::DeduplicationStore;

/// Outcome of a monitoring run
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub workers: Vec<WorkerSummary>,
    pub consumers: Vec<ConsumerSummary>,
    pub events_published: u64,
    pub deliveries: u64,
    /// Distinct `(provider, id)` pairs admitted during the run
    pub unique_events: usize,
}

impl MonitorReport {
    fn new(
        workers: Vec<WorkerSummary>,
        consumers: Vec<ConsumerSummary>,
        bus: BusStats,
        unique_events: usize,
    ) -> Self {
        Self {
            workers,
            consumers,
            events_published: bus.events_published,
            deliveries: bus.deliveries,
            unique_events,
        }
    }
}

/// Status monitor assembled from configuration
pub struct StatusMonitor {
    config: Config,
    registry: ProviderRegistry,
    consumers: Vec<Arc<dyn EventConsumer>>,
}

impl StatusMonitor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: ProviderRegistry::new(),
            consumers: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a status provider
    pub fn register_provider<P>(&mut self, provider: P) -> std::result::Result<(), RegistryError>
    where
        P: StatusProvider + 'static,
    {
        self.registry.register(provider)
    }

    /// Attach a consumer; it receives every event published after `run_until` starts
    pub fn add_consumer(&mut self, consumer: Arc<dyn EventConsumer>) {
        self.consumers.push(consumer);
    }

    /// Attach the console and webhook consumers named in the configuration
    pub fn add_configured_consumers(&mut self) -> ConsumerResult<()> {
        if self.config.consumers.console {
            self.add_consumer(Arc::new(ConsoleConsumer::new()));
        }

        for webhook in self.config.consumers.webhooks.clone() {
            let consumer = WebhookConsumer::new(webhook)?;
            tracing::debug!(url = consumer.url(), "Webhook consumer configured");
            self.add_consumer(Arc::new(consumer));
        }

        Ok(())
    }

    pub fn provider_count(&self) -> usize {
        self.registry.len()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Run providers and consumers until `signal` resolves
    ///
    /// Consumers subscribe before the first worker starts, so none of them
    /// miss an event. Queued events are not drained on shutdown.
    pub async fn run_until<F>(self, signal: F) -> Result<MonitorReport>
    where
        F: Future<Output = ()>,
    {
        self.config
            .validate()
            .map_err(|e| Error::config(format!("{e:#}")))?;

        let dedup = Arc::new(DeduplicationStore::new());
        let bus = Arc::new(EventBus::from_config(&self.config.bus));
        let scheduler = Scheduler::new(
            self.registry,
            Arc::clone(&dedup),
            Arc::clone(&bus),
            &self.config.scheduler,
        )?;

        if self.consumers.is_empty() {
            tracing::warn!("No consumers configured, events will not be delivered anywhere");
        }

        let consumer_handles: Vec<_> = self
            .consumers
            .into_iter()
            .map(|consumer| {
                let name = consumer.name().to_string();
                let handle = spawn_consumer(consumer, bus.subscribe(), scheduler.shutdown_receiver());
                (name, handle)
            })
            .collect();

        tracing::info!(
            providers = scheduler.provider_count(),
            consumers = consumer_handles.len(),
            concurrency_limit = scheduler.concurrency_limit(),
            queue_capacity = ?bus.capacity(),
            "Status monitor starting"
        );

        let run = scheduler.run();
        tokio::pin!(run);

        let workers = tokio::select! {
            result = &mut run => result?,
            _ = signal => {
                tracing::info!("Stop signal received");
                scheduler.stop();
                run.await?
            }
        };

        // Consumers share the workers' shutdown signal
        scheduler.stop();

        let mut consumers = Vec::with_capacity(consumer_handles.len());
        for (name, handle) in consumer_handles {
            match handle.await {
                Ok(summary) => consumers.push(summary),
                Err(e) => tracing::error!(consumer = %name, error = %e, "Consumer task failed"),
            }
        }

        let report = MonitorReport::new(workers, consumers, bus.stats().await, dedup.len());

        tracing::info!(
            published = report.events_published,
            deliveries = report.deliveries,
            unique_events = report.unique_events,
            "Status monitor stopped"
        );

        Ok(report)
    }
}

impl std::fmt::Debug for StatusMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusMonitor")
            .field("providers", &self.registry.names())
            .field(
                "consumers",
                &self.consumers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
