//! Configuration management for statuswatch
//!
//! This module handles loading and validating configuration from environment variables,
//! TOML files, and command-line overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::consumers::webhook::WebhookConfig;

/// Default number of fetches allowed in flight at once
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 20;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Distribution channel configuration
    pub bus: BusConfig,

    /// Shared HTTP client configuration
    pub http: HttpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Consumer configuration
    pub consumers: ConsumersConfig,
}

/// Scheduler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of provider fetches in flight at once
    pub concurrency_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

/// Distribution channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of each subscriber queue; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: format!("statuswatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// Consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumersConfig {
    /// Print events to stdout
    pub console: bool,

    /// Webhook endpoints that receive every event
    pub webhooks: Vec<WebhookConfig>,
}

impl Default for ConsumersConfig {
    fn default() -> Self {
        Self {
            console: true,
            webhooks: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let concurrency_limit = std::env::var("STATUSWATCH_CONCURRENCY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.scheduler.concurrency_limit);

        let queue_capacity = std::env::var("STATUSWATCH_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());

        let request_timeout_secs = std::env::var("STATUSWATCH_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.http.request_timeout_secs);

        let user_agent =
            std::env::var("STATUSWATCH_USER_AGENT").unwrap_or(defaults.http.user_agent);

        let log_level =
            std::env::var("STATUSWATCH_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("STATUSWATCH_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        let console = std::env::var("STATUSWATCH_CONSOLE")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let webhooks = std::env::var("STATUSWATCH_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| vec![WebhookConfig::new(url.trim())])
            .unwrap_or_default();

        Ok(Self {
            scheduler: SchedulerConfig { concurrency_limit },
            bus: BusConfig { queue_capacity },
            http: HttpConfig {
                request_timeout_secs,
                user_agent,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
            consumers: ConsumersConfig { console, webhooks },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.concurrency_limit == 0 {
            anyhow::bail!("concurrency_limit must be greater than 0");
        }

        if self.bus.queue_capacity == Some(0) {
            anyhow::bail!("queue_capacity must be greater than 0 when set");
        }

        if self.http.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json', got '{}'", self.logging.format);
        }

        for webhook in &self.consumers.webhooks {
            webhook
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid webhook '{}': {e}", webhook.url))?;
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }
}
