// Core data structures for statuswatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical event emitted by every provider adapter
///
/// Events are immutable once built. The bus hands each subscriber a shared
/// `Arc<StatusEvent>`, so consumers only ever see a read-only view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Identifier scoped to the provider (incident id, or `incident:component`)
    pub id: String,
    /// Provider identity, e.g. "OpenAI"; also the dedup namespace
    pub provider: String,
    /// Affected product or component name
    pub service: String,
    /// Incident title combined with the latest status text
    pub message: String,
    /// When the incident was last updated (UTC)
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    /// Create a new event
    pub fn new(
        provider: impl Into<String>,
        id: impl Into<String>,
        service: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            service: service.into(),
            message: message.into(),
            timestamp,
        }
    }

    /// Deduplication key for this event
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.provider, &self.id)
    }
}

/// `(provider, id)` pair identifying whether an event has been seen before
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    pub provider: String,
    pub id: String,
}

impl DedupKey {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_from_event() {
        let event = StatusEvent::new("OpenAI", "inc-1:API", "API", "Outage -- Resolved", Utc::now());
        let key = event.dedup_key();
        assert_eq!(key, DedupKey::new("OpenAI", "inc-1:API"));
        assert_eq!(key.to_string(), "OpenAI/inc-1:API");
    }

    #[test]
    fn test_event_serialization() {
        let event = StatusEvent::new("GitHub", "42", "Actions", "Degraded -- Investigating", Utc::now());
        let json = serde_json::to_string(&event).unwrap();
        let back: StatusEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
