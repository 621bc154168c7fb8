//! OpenAI status page provider
//!
//! Polls the Atom feed published at `status.openai.com` and turns each
//! incident entry into one event per affected component.
//!
//! Conditional requests (`ETag` / `If-None-Match`) let an unchanged feed
//! short-circuit to an empty fetch without re-parsing.

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

use super::{ProviderError, ProviderResult, StatusProvider};
use crate::models::StatusEvent;
use crate::utils::normalize_whitespace;

/// Public Atom feed of the OpenAI status page
pub const OPENAI_FEED_URL: &str = "https://status.openai.com/feed.atom";

const PROVIDER_NAME: &str = "OpenAI";
const INCIDENT_MARKER: &str = "/incidents/";

lazy_static! {
    static ref LIST_ITEM: Selector = Selector::parse("li").expect("Invalid CSS selector: li");
}

/// Provider adapter for the OpenAI status Atom feed
pub struct OpenAIProvider {
    /// Shared HTTP client (one connection pool for all providers)
    client: Client,

    /// Feed location
    feed_url: String,

    /// `ETag` of the last 200 response
    etag: Mutex<Option<String>>,
}

impl OpenAIProvider {
    /// Create a provider polling the public feed
    pub fn new(client: Client) -> Self {
        Self::with_feed_url(client, OPENAI_FEED_URL)
    }

    /// Create a provider polling a custom feed location
    pub fn with_feed_url(client: Client, feed_url: impl Into<String>) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
            etag: Mutex::new(None),
        }
    }

    /// Feed URL this provider polls
    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// `ETag` remembered from the last successful fetch
    pub fn etag(&self) -> Option<String> {
        self.etag.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Perform one conditional request and parse the body if it changed
    async fn poll(&self) -> ProviderResult<Vec<StatusEvent>> {
        let mut request = self.client.get(&self.feed_url);
        if let Some(etag) = self.etag() {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_MODIFIED => return Ok(Vec::new()),
            StatusCode::OK => {}
            other => return Err(ProviderError::UnexpectedStatus(other.as_u16())),
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await?;
        let events = Self::parse_feed(&body)?;

        *self.etag.lock().unwrap_or_else(PoisonError::into_inner) = etag;

        Ok(events)
    }

    /// Parse an Atom document into events
    pub fn parse_feed(body: &[u8]) -> ProviderResult<Vec<StatusEvent>> {
        let feed = feed_rs::parser::parse(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

        let mut events = Vec::new();

        for entry in feed.entries {
            let Some(incident_id) = extract_incident_id(&entry.id) else {
                continue;
            };

            let title = entry
                .title
                .map(|t| normalize_whitespace(&t.content))
                .unwrap_or_else(|| "Unknown incident".to_string());
            let summary_html = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let timestamp = entry.updated.or(entry.published).unwrap_or_else(Utc::now);

            let message = format!("{title} -- {}", extract_status(&summary_html));
            let components = extract_components(&summary_html);

            if components.is_empty() {
                events.push(StatusEvent::new(
                    PROVIDER_NAME,
                    incident_id,
                    title,
                    message,
                    timestamp,
                ));
                continue;
            }

            for component in components {
                events.push(StatusEvent::new(
                    PROVIDER_NAME,
                    format!("{incident_id}:{component}"),
                    component,
                    message.clone(),
                    timestamp,
                ));
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl StatusProvider for OpenAIProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(300)
    }

    async fn fetch_events(&self) -> Vec<StatusEvent> {
        match self.poll().await {
            Ok(events) => events,
            Err(ProviderError::UnexpectedStatus(status)) => {
                tracing::warn!(provider = PROVIDER_NAME, status, "Unexpected feed status");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(provider = PROVIDER_NAME, error = %e, "Feed fetch failed");
                Vec::new()
            }
        }
    }
}

/// Incident identifier from an entry id such as `.../incidents/01JMYB4`
fn extract_incident_id(entry_id: &str) -> Option<&str> {
    let idx = entry_id.rfind(INCIDENT_MARKER)?;
    let id = &entry_id[idx + INCIDENT_MARKER.len()..];
    (!id.is_empty()).then_some(id)
}

/// Status text (e.g. "Resolved") following `Status:` in the summary HTML
fn extract_status(html: &str) -> String {
    static STATUS_RE: OnceLock<Regex> = OnceLock::new();

    let re = STATUS_RE
        .get_or_init(|| Regex::new(r"(?i)Status:\s*(.+?)(?:<|$)").expect("Invalid regex pattern"));

    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Component names from `<li>` items, without their `(Status)` suffix
fn extract_components(html: &str) -> Vec<String> {
    static SUFFIX_RE: OnceLock<Regex> = OnceLock::new();

    let suffix =
        SUFFIX_RE.get_or_init(|| Regex::new(r"\s*\(.*?\)\s*$").expect("Invalid regex pattern"));

    let fragment = Html::parse_fragment(html);
    fragment
        .select(&LIST_ITEM)
        .map(|li| normalize_whitespace(&li.text().collect::<String>()))
        .map(|raw| suffix.replace(&raw, "").trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
