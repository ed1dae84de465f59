//! Browser Snapshot Client
//!
//! Reads the latest tab event stored on the central server by the browser
//! extension and flattens it into a [`BrowserSnapshot`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::{BrowserSource, SignalError};

/// Default timeout for browser snapshot requests
const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Storage key the extension writes its latest event under
pub const LATEST_TAB_EVENT_KEY: &str = "latest_tab_event";

/// Most recently observed browser tab content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSnapshot {
    pub url: String,
    pub title: String,
    /// Page body text or HTML, depending on the event type
    pub text_content: String,
    /// Event timestamp (ms since epoch); 0 when nothing was observed
    pub timestamp: i64,
}

impl BrowserSnapshot {
    /// Title and body joined for analysis, trimmed
    pub fn content(&self) -> String {
        format!("{} {}", self.title, self.text_content)
            .trim()
            .to_string()
    }

    /// Whether there is anything to judge at all
    pub fn has_content(&self) -> bool {
        !self.url.is_empty() || !self.content().is_empty()
    }
}

/// Flatten a storage envelope `{success, data: {event, timestamp, data}}`.
///
/// Unknown event types keep the envelope timestamp but carry no content.
pub fn snapshot_from_envelope(envelope: &Value) -> Result<BrowserSnapshot, SignalError> {
    let success = envelope
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let event = match envelope.get("data") {
        Some(event) if success && event.is_object() => event,
        _ => {
            return Err(SignalError::Rejected(
                "storage returned no tab event".to_string(),
            ))
        }
    };

    let timestamp = event.get("timestamp").and_then(as_timestamp).unwrap_or(0);
    let event_type = event.get("event").and_then(Value::as_str).unwrap_or("");
    let payload = event.get("data").unwrap_or(&Value::Null);

    let mut snapshot = BrowserSnapshot {
        timestamp,
        ..Default::default()
    };

    match event_type {
        "tab_activated" | "tab_updated" | "tab_data_captured" => {
            snapshot.url = string_field(payload, "url");
            snapshot.title = string_field(payload, "title");
        }
        "full_html_captured" => {
            snapshot.url = string_field(payload, "url");
            snapshot.title = string_field(payload, "title");
            snapshot.text_content = string_field(payload, "bodyHTML");
        }
        "dom_data_updated" => {
            snapshot.url = string_field(payload, "url");
            snapshot.text_content = payload
                .get("domData")
                .map(|dom| string_field(dom, "bodyText"))
                .unwrap_or_default();
        }
        other => {
            debug!("Ignoring content of unknown tab event '{}'", other);
        }
    }

    Ok(snapshot)
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn as_timestamp(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

/// HTTP client for the central server's storage API
pub struct BrowserDataClient {
    /// Storage base URL (e.g., "http://localhost:3000/api/storage")
    server_url: String,
    key: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl BrowserDataClient {
    /// Create a new browser data client
    pub fn new(server_url: &str) -> Self {
        info!("Creating browser data client for {}", server_url);
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            key: LATEST_TAB_EVENT_KEY.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            http: reqwest::Client::new(),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read a different storage key
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    /// URL of the event being read
    pub fn event_url(&self) -> String {
        format!("{}/{}", self.server_url, self.key)
    }

    /// Fetch and flatten the latest tab event
    pub async fn fetch(&self) -> Result<BrowserSnapshot, SignalError> {
        let envelope: Value = self
            .http
            .get(self.event_url())
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SignalError::from_http(e, self.timeout))?
            .json()
            .await
            .map_err(|e| SignalError::from_http(e, self.timeout))?;

        let snapshot = snapshot_from_envelope(&envelope)?;
        debug!(
            "Browser snapshot: url={} ts={} text_len={}",
            snapshot.url,
            snapshot.timestamp,
            snapshot.text_content.len()
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl BrowserSource for BrowserDataClient {
    async fn snapshot(&self) -> Result<BrowserSnapshot, SignalError> {
        self.fetch().await
    }
}
