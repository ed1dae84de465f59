//! Face-Count API Client
//!
//! Reads and publishes the latest face count held by the face-counter API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::{FaceCountSource, SignalError};

/// Default timeout for face-count requests
const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// One reading of the published face count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceCountReading {
    /// Number of faces in the last counted frame
    #[serde(default)]
    pub count: u32,
    /// When the count was published. Absent or unparseable timestamps are
    /// tolerated; the count is still usable.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub camera_id: Option<u32>,
    /// Publish sequence number, when the server provides one
    #[serde(default)]
    pub sequence: Option<u64>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

/// HTTP client for the face-count endpoint
pub struct FaceCountClient {
    /// Endpoint URL (e.g., "http://127.0.0.1:8000/face-count")
    url: String,
    /// Request timeout
    timeout: Duration,
    http: reqwest::Client,
}

impl FaceCountClient {
    /// Create a new face-count client
    pub fn new(url: &str) -> Self {
        info!("Creating face-count client for {}", url);
        Self {
            url: url.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            http: reqwest::Client::new(),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the latest published count
    pub async fn fetch(&self) -> Result<FaceCountReading, SignalError> {
        let response = self
            .http
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SignalError::from_http(e, self.timeout))?;

        let reading: FaceCountReading = response
            .json()
            .await
            .map_err(|e| SignalError::from_http(e, self.timeout))?;

        debug!("Face count reading: {:?}", reading);
        Ok(reading)
    }

    /// Publish a new count (used by the counting process)
    pub async fn publish(&self, count: u32, camera_id: Option<u32>) -> Result<(), SignalError> {
        let mut request = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .query(&[("count", count)]);
        if let Some(camera_id) = camera_id {
            request = request.query(&[("camera_id", camera_id)]);
        }

        request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SignalError::from_http(e, self.timeout))?;

        debug!("Published face count {} (camera {:?})", count, camera_id);
        Ok(())
    }
}

#[async_trait]
impl FaceCountSource for FaceCountClient {
    async fn face_count(&self) -> Result<FaceCountReading, SignalError> {
        self.fetch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_with_rfc3339_timestamp() {
        let json = r#"{"count": 2, "timestamp": "2024-05-01T10:00:00Z", "camera_id": 0, "sequence": 7}"#;
        let reading: FaceCountReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.count, 2);
        assert!(reading.timestamp.is_some());
        assert_eq!(reading.camera_id, Some(0));
        assert_eq!(reading.sequence, Some(7));
    }

    #[test]
    fn test_reading_with_naive_timestamp() {
        // Naive local timestamps are dropped rather than failing the read
        let json = r#"{"count": 3, "timestamp": "2024-05-01T10:00:00.123456", "camera_id": null}"#;
        let reading: FaceCountReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.count, 3);
        assert!(reading.timestamp.is_none());
    }

    #[test]
    fn test_reading_missing_count_defaults_to_zero() {
        let reading: FaceCountReading = serde_json::from_str("{}").unwrap();
        assert_eq!(reading.count, 0);
    }

    #[test]
    fn test_negative_count_is_decode_error() {
        assert!(serde_json::from_str::<FaceCountReading>(r#"{"count": -1}"#).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let client = FaceCountClient::new("http://127.0.0.1:9/face-count")
            .with_timeout(Duration::from_millis(500));
        assert!(client.fetch().await.is_err());
    }
}
