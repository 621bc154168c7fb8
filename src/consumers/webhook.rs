//! Webhook consumer
//!
//! Forwards each event to an HTTP endpoint as a JSON `POST`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{ConsumerError, ConsumerResult, EventConsumer};
use crate::models::StatusEvent;

/// Webhook consumer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL endpoint
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Custom headers to include in requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retry attempts on failure
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt
    #[serde(default = "default_retry_delay")]
    pub retry_base_delay_ms: u64,
}

fn default_timeout() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl WebhookConfig {
    /// Create a new webhook configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            headers: HashMap::new(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_base_delay_ms: default_retry_delay(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Webhook URL cannot be empty".to_string());
        }

        let url = url::Url::parse(&self.url).map_err(|e| format!("Invalid webhook URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Backoff before the given retry attempt (1-based)
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

/// Webhook event consumer
///
/// Sends each event as the JSON serialisation of [`StatusEvent`]:
///
/// ```json
/// {
///   "id": "01JXCAW3K3:Chat Completions",
///   "provider": "OpenAI",
///   "service": "Chat Completions",
///   "message": "Elevated error rates -- Investigating",
///   "timestamp": "2025-06-10T14:03:09Z"
/// }
/// ```
///
/// Server errors and transport failures are retried with exponential
/// backoff; client errors (4xx) are not.
pub struct WebhookConsumer {
    config: WebhookConfig,
    client: Client,
}

impl WebhookConsumer {
    /// Create a new webhook consumer
    pub fn new(config: WebhookConfig) -> ConsumerResult<Self> {
        config.validate().map_err(ConsumerError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConsumerError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create a webhook consumer with just a URL
    pub fn from_url(url: impl Into<String>) -> ConsumerResult<Self> {
        Self::new(WebhookConfig::new(url))
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Send the payload, retrying transient failures
    async fn send_with_retry(&self, payload: &serde_json::Value) -> ConsumerResult<()> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay(attempt)).await;
                tracing::debug!(
                    url = %self.config.url,
                    attempt = attempt + 1,
                    max_attempts = self.config.max_retries + 1,
                    "Retrying webhook request"
                );
            }

            let mut request = self.client.post(&self.config.url);

            if let Some(token) = &self.config.auth_token {
                request = request.bearer_auth(token);
            }

            for (key, value) in &self.config.headers {
                request = request.header(key, value);
            }

            match request.json(payload).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(
                        url = %self.config.url,
                        status = response.status().as_u16(),
                        "Webhook delivered"
                    );
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read response body".to_string());

                    last_error = Some(ConsumerError::Rejected {
                        status: status.as_u16(),
                        body,
                    });

                    // Don't retry on client errors (4xx)
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(ConsumerError::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ConsumerError::Other("Unknown error".to_string())))
    }
}

#[async_trait]
impl EventConsumer for WebhookConsumer {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn process(&self, event: &StatusEvent) -> ConsumerResult<()> {
        let payload = serde_json::to_value(event)?;
        self.send_with_retry(&payload).await
    }
}

impl std::fmt::Debug for WebhookConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConsumer")
            .field("url", &self.config.url)
            .field("max_retries", &self.config.max_retries)
            .field("has_auth", &self.config.auth_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_config_validation() {
        assert!(WebhookConfig::new("https://example.com/webhook").validate().is_ok());
        assert!(WebhookConfig::new("").validate().is_err());
        assert!(WebhookConfig::new("example.com/webhook").validate().is_err());
        assert!(WebhookConfig::new("ftp://example.com/drop").validate().is_err());
        assert!(WebhookConfig::new("https://example.com")
            .with_timeout(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_webhook_config_builder() {
        let config = WebhookConfig::new("https://example.com/webhook")
            .with_auth_token("secret-token")
            .with_header("X-Custom", "value")
            .with_timeout(30)
            .with_max_retries(5)
            .with_retry_delay(Duration::from_millis(50));

        assert_eq!(config.auth_token.as_deref(), Some("secret-token"));
        assert_eq!(config.headers.get("X-Custom").map(String::as_str), Some("value"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_base_delay_ms, 50);
    }

    #[test]
    fn test_retry_delay_doubles() {
        let config = WebhookConfig::new("https://example.com");
        assert_eq!(config.retry_delay(1), Duration::from_secs(1));
        assert_eq!(config.retry_delay(2), Duration::from_secs(2));
        assert_eq!(config.retry_delay(4), Duration::from_secs(8));
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: WebhookConfig = toml::from_str(r#"url = "https://hooks.example.com/status""#)
            .unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay_ms, 1000);
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_consumer_creation() {
        let consumer = WebhookConsumer::from_url("https://example.com/alerts").unwrap();
        assert_eq!(consumer.name(), "webhook");
        assert_eq!(consumer.url(), "https://example.com/alerts");

        let invalid = WebhookConsumer::from_url("not-a-url");
        assert!(matches!(invalid, Err(ConsumerError::InvalidConfig(_))));
    }
}
