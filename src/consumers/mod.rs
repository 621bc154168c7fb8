//! Event consumers
//!
//! A consumer drains its own bus subscription and does something with each
//! event: print it, forward it to a webhook, and so on. Each consumer runs
//! on its own task, so a slow or failing consumer never holds up another.

pub mod console;
pub mod webhook;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::Subscription;
use crate::metrics;
use crate::models::StatusEvent;
use crate::scheduler::shutdown_requested;
use crate::utils::panic_message;

pub use console::ConsoleConsumer;
pub use webhook::{WebhookConfig, WebhookConsumer};

/// Result type for consumer operations
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Errors that can occur while handling an event
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid consumer configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Remote end refused the event
    #[error("Rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("Consumer error: {0}")]
    Other(String),
}

/// Trait for event consumers
///
/// Implement this trait to add a new event sink.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Consumer name used in logs and metrics
    fn name(&self) -> &str;

    /// Handle one event
    async fn process(&self, event: &StatusEvent) -> ConsumerResult<()>;
}

/// Counters reported by a consumer loop when it ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerSummary {
    pub consumer: String,
    /// Events taken off the queue
    pub received: u64,
    pub processed: u64,
    /// Events whose handling returned an error or panicked
    pub failures: u64,
}

/// Drain a subscription into a consumer until shutdown or queue close
///
/// Failures are logged per event and never end the loop.
pub async fn run_consumer(
    consumer: Arc<dyn EventConsumer>,
    mut subscription: Subscription,
    mut shutdown: watch::Receiver<bool>,
) -> ConsumerSummary {
    let mut summary = ConsumerSummary {
        consumer: consumer.name().to_string(),
        ..Default::default()
    };

    tracing::info!(
        consumer = %summary.consumer,
        subscriber = subscription.id(),
        "Consumer started"
    );

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            next = subscription.recv() => next,
        };
        let Some(event) = next else {
            tracing::debug!(consumer = %summary.consumer, "Subscription closed");
            break;
        };
        summary.received += 1;

        let outcome = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            outcome = AssertUnwindSafe(consumer.process(&event)).catch_unwind() => outcome,
        };

        match outcome {
            Ok(Ok(())) => {
                summary.processed += 1;
                metrics::record_consumer_result(&summary.consumer, true);
            }
            Ok(Err(e)) => {
                summary.failures += 1;
                metrics::record_consumer_result(&summary.consumer, false);
                tracing::error!(
                    consumer = %summary.consumer,
                    provider = %event.provider,
                    id = %event.id,
                    error = %e,
                    "Failed to process event"
                );
            }
            Err(payload) => {
                summary.failures += 1;
                metrics::record_consumer_result(&summary.consumer, false);
                tracing::error!(
                    consumer = %summary.consumer,
                    provider = %event.provider,
                    id = %event.id,
                    panic = %panic_message(payload.as_ref()),
                    "Consumer panicked while processing event"
                );
            }
        }
    }

    tracing::info!(
        consumer = %summary.consumer,
        processed = summary.processed,
        failures = summary.failures,
        "Consumer stopped"
    );

    summary
}

/// Run a consumer loop on its own task
pub fn spawn_consumer(
    consumer: Arc<dyn EventConsumer>,
    subscription: Subscription,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<ConsumerSummary> {
    tokio::spawn(run_consumer(consumer, subscription, shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventConsumer for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn process(&self, event: &StatusEvent) -> ConsumerResult<()> {
            if event.id == "bad" {
                return Err(ConsumerError::Other("refusing bad event".to_string()));
            }
            self.seen.lock().unwrap().push(event.id.clone());
            Ok(())
        }
    }

    fn event(id: &str) -> StatusEvent {
        StatusEvent::new("test", id, "api", "Investigating", Utc::now())
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_the_loop() {
        let bus = EventBus::unbounded();
        let subscription = bus.subscribe();
        let (_tx, rx) = watch::channel(false);
        let recorder = Arc::new(Recorder::default());

        bus.publish(event("a")).await;
        bus.publish(event("bad")).await;
        bus.publish(event("b")).await;
        drop(bus);

        let summary = run_consumer(recorder.clone(), subscription, rx).await;

        assert_eq!(summary.consumer, "recorder");
        assert_eq!(summary.received, 3);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_shutdown_ends_idle_consumer() {
        let bus = EventBus::unbounded();
        let (tx, rx) = watch::channel(false);

        let handle = spawn_consumer(Arc::new(Recorder::default()), bus.subscribe(), rx);
        tx.send(true).unwrap();

        let summary = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("consumer should stop on shutdown")
            .unwrap();
        assert_eq!(summary.received, 0);
    }

    #[test]
    fn test_consumer_error_display() {
        let err = ConsumerError::Rejected {
            status: 422,
            body: "bad payload".to_string(),
        };
        assert_eq!(err.to_string(), "Rejected with HTTP 422: bad payload");
    }
}
