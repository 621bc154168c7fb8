//! Console consumer
//!
//! Prints each event as a short block on stdout.

use async_trait::async_trait;

use super::{ConsumerResult, EventConsumer};
use crate::models::StatusEvent;

/// Writes events to standard output
#[derive(Debug, Default, Clone)]
pub struct ConsoleConsumer;

impl ConsoleConsumer {
    pub fn new() -> Self {
        Self
    }

    /// Render an event the way it is printed
    pub fn format_event(event: &StatusEvent) -> String {
        format!(
            "[{}] Provider: {}\n  Product: {}\n  Status: {}\n",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.provider,
            event.service,
            event.message
        )
    }
}

#[async_trait]
impl EventConsumer for ConsoleConsumer {
    fn name(&self) -> &str {
        "console"
    }

    async fn process(&self, event: &StatusEvent) -> ConsumerResult<()> {
        println!("{}", Self::format_event(event));
        Ok(())
    }
}
