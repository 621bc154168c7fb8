//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use statuswatch::consumers::{ConsumerError, ConsumerResult, EventConsumer};
use statuswatch::models::StatusEvent;
use statuswatch::providers::StatusProvider;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Create a test event with default values
pub fn event(provider: &str, id: &str) -> StatusEvent {
    StatusEvent::new(provider, id, "API", "Investigating", Utc::now())
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Await `future`, failing the test if it takes longer than `secs`
pub async fn within<T>(secs: u64, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(secs), future)
        .await
        .expect("operation timed out")
}

// ============================================================================
// Providers
// ============================================================================

/// Tracks how many fetches are running at the same time
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn enter(self: &Arc<Self>) -> ProbeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        ProbeGuard(Arc::clone(self))
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

pub struct ProbeGuard(Arc<ConcurrencyProbe>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicMode {
    Never,
    Always,
    FirstCall,
}

/// Configurable provider for exercising the scheduler
pub struct StubProvider {
    name: String,
    interval: Duration,
    fetch_delay: Duration,
    ids: Vec<String>,
    fresh_ids: bool,
    panic_mode: PanicMode,
    calls: Arc<AtomicUsize>,
    probe: Option<Arc<ConcurrencyProbe>>,
}

impl StubProvider {
    /// Provider returning the same ids on every call
    pub fn new(name: &str, ids: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            interval: Duration::from_secs(3600),
            fetch_delay: Duration::ZERO,
            ids: ids.iter().map(|id| id.to_string()).collect(),
            fresh_ids: false,
            panic_mode: PanicMode::Never,
            calls: Arc::new(AtomicUsize::new(0)),
            probe: None,
        }
    }

    /// Provider returning one never-seen id per call
    pub fn fresh(name: &str) -> Self {
        Self {
            fresh_ids: true,
            ..Self::new(name, &[])
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_panic(mut self, mode: PanicMode) -> Self {
        self.panic_mode = mode;
        self
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Shared call counter, usable after the provider is registered
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl StatusProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn fetch_events(&self) -> Vec<StatusEvent> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.probe.as_ref().map(|probe| probe.enter());

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        match self.panic_mode {
            PanicMode::Always => panic!("{} feed exploded", self.name),
            PanicMode::FirstCall if call == 0 => panic!("{} failed on first call", self.name),
            _ => {}
        }

        if self.fresh_ids {
            return vec![event(&self.name, &format!("inc-{call}"))];
        }

        self.ids.iter().map(|id| event(&self.name, id)).collect()
    }
}

// ============================================================================
// Consumers
// ============================================================================

/// Consumer that records what it handled and can be told to misbehave
#[derive(Default)]
pub struct RecordingConsumer {
    name: String,
    events: Mutex<Vec<StatusEvent>>,
    fail_ids: Vec<String>,
    panic_ids: Vec<String>,
}

impl RecordingConsumer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.fail_ids.push(id.to_string());
        self
    }

    pub fn panicking_on(mut self, id: &str) -> Self {
        self.panic_ids.push(id.to_string());
        self
    }

    pub fn ids(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.id.clone())
            .collect()
    }
}

#[async_trait]
impl EventConsumer for RecordingConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, event: &StatusEvent) -> ConsumerResult<()> {
        if self.panic_ids.contains(&event.id) {
            panic!("{} cannot handle {}", self.name, event.id);
        }
        if self.fail_ids.contains(&event.id) {
            return Err(ConsumerError::Other(format!("refused {}", event.id)));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
