//! Integration tests for OpenAIProvider using wiremock
//!
//! These tests validate feed parsing, conditional requests and the
//! empty-result behaviour on failures.

use chrono::{TimeZone, Utc};
use statuswatch::providers::{OpenAIProvider, StatusProvider};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>https://status.openai.com/</id>
  <title>OpenAI status</title>
  <updated>2025-06-10T15:00:00Z</updated>
  <link href="https://status.openai.com/" rel="alternate" type="text/html"/>
  <entry>
    <id>https://status.openai.com/incidents/01JXCAW3K3JAE0EP56AEZ7CBG3</id>
    <title>Elevated   error rates on ChatGPT</title>
    <updated>2025-06-10T14:03:09Z</updated>
    <link href="https://status.openai.com/incidents/01JXCAW3K3JAE0EP56AEZ7CBG3" rel="alternate"/>
    <summary type="html">&lt;p&gt;Status: Investigating&lt;/p&gt;&lt;p&gt;Affected components&lt;/p&gt;&lt;ul&gt;&lt;li&gt;ChatGPT (Degraded performance)&lt;/li&gt;&lt;li&gt;Sora (Operational)&lt;/li&gt;&lt;/ul&gt;</summary>
  </entry>
  <entry>
    <id>https://status.openai.com/incidents/01JX9Q0000000000000000LOGN</id>
    <title>Login issues</title>
    <updated>2025-06-09T08:00:00Z</updated>
    <summary type="html">&lt;p&gt;Status: Resolved&lt;/p&gt;</summary>
  </entry>
  <entry>
    <id>tag:status.openai.com,2005:Maintenance/42</id>
    <title>Scheduled maintenance</title>
    <updated>2025-06-08T00:00:00Z</updated>
  </entry>
</feed>"#;

fn provider_for(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::with_feed_url(reqwest::Client::new(), format!("{}/feed.atom", server.uri()))
}

/// Test successful fetch and per-component expansion
#[tokio::test]
async fn test_fetch_parses_incidents() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.atom"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    let events = provider.fetch_events().await;

    assert_eq!(events.len(), 3, "two components plus one bare incident");

    assert_eq!(events[0].id, "01JXCAW3K3JAE0EP56AEZ7CBG3:ChatGPT");
    assert_eq!(events[0].provider, "OpenAI");
    assert_eq!(events[0].service, "ChatGPT");
    assert_eq!(
        events[0].message,
        "Elevated error rates on ChatGPT -- Investigating"
    );
    assert_eq!(
        events[0].timestamp,
        Utc.with_ymd_and_hms(2025, 6, 10, 14, 3, 9).unwrap()
    );

    assert_eq!(events[1].id, "01JXCAW3K3JAE0EP56AEZ7CBG3:Sora");
    assert_eq!(events[1].service, "Sora");

    assert_eq!(events[2].id, "01JX9Q0000000000000000LOGN");
    assert_eq!(events[2].service, "Login issues");
    assert_eq!(events[2].message, "Login issues -- Resolved");
}

/// Test that the stored ETag is sent back and 304 yields nothing
#[tokio::test]
async fn test_etag_round_trip_not_modified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.atom"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/feed.atom"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"v1\"")
                .set_body_string(FEED),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);

    let first = provider.fetch_events().await;
    assert_eq!(first.len(), 3);
    assert_eq!(provider.etag().as_deref(), Some("\"v1\""));

    let second = provider.fetch_events().await;
    assert!(second.is_empty());
    // A 304 keeps the previous validator
    assert_eq!(provider.etag().as_deref(), Some("\"v1\""));
}

/// Test non-200 responses yield no events
#[tokio::test]
async fn test_server_error_yields_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.atom"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    assert!(provider.fetch_events().await.is_empty());
    assert!(provider.etag().is_none());
}

/// Test an unparseable body yields no events and stores no ETag
#[tokio::test]
async fn test_garbage_body_yields_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.atom"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"broken\"")
                .set_body_string("<html><body>Maintenance</body>"),
        )
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server);
    assert!(provider.fetch_events().await.is_empty());
    assert!(provider.etag().is_none());
}

/// Test transport failures yield no events
#[tokio::test]
async fn test_unreachable_host_yields_empty() {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(2))
        .build()
        .unwrap();

    // Nothing listens on the discard port
    let provider = OpenAIProvider::with_feed_url(client, "http://127.0.0.1:9/feed.atom");
    assert!(provider.fetch_events().await.is_empty());
}
