//! Signal hub
//!
//! The only place signal failures are seen. Each failure is logged and
//! replaced by its safe default, so the decision engine works over plain
//! values:
//!
//! | Signal      | Default                          |
//! |-------------|----------------------------------|
//! | face count  | 0                                |
//! | snapshot    | empty, timestamp 0               |
//! | sensitivity | not sensitive                    |

use async_trait::async_trait;
use signal_clients::{
    BrowserDataClient, BrowserSnapshot, BrowserSource, FaceCountClient, FaceCountSource,
    SensitivityChecker, SensitivityOracle,
};
use tracing::{debug, warn};

use crate::GuardConfig;

/// Inputs of one decision cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    pub face_count: u32,
    pub snapshot: BrowserSnapshot,
}

/// Total sensitivity check used by the engine
#[async_trait]
pub trait SensitivityCheck: Send + Sync {
    async fn is_sensitive(&self, content: &str, url: &str) -> bool;
}

/// Owns the signal sources and converts their failures to safe defaults
pub struct SignalHub {
    face_count: Box<dyn FaceCountSource>,
    browser: Box<dyn BrowserSource>,
    oracle: Box<dyn SensitivityOracle>,
}

impl SignalHub {
    pub fn new(
        face_count: Box<dyn FaceCountSource>,
        browser: Box<dyn BrowserSource>,
        oracle: Box<dyn SensitivityOracle>,
    ) -> Self {
        Self {
            face_count,
            browser,
            oracle,
        }
    }

    /// HTTP clients for every source, with the configured timeouts
    pub fn from_config(config: &GuardConfig) -> Self {
        let face_count =
            FaceCountClient::new(&config.face_api_url).with_timeout(config.face_count_timeout());
        let browser = BrowserDataClient::new(&config.browser_server_url)
            .with_timeout(config.browser_timeout());
        let oracle = SensitivityChecker::new(&config.llm_url, &config.llm_model)
            .with_api_token(config.api_token.clone())
            .with_timeout(config.llm_timeout());

        Self::new(Box::new(face_count), Box::new(browser), Box::new(oracle))
    }

    /// Read face count and browser snapshot concurrently
    pub async fn gather(&self) -> Signals {
        let (face_count, snapshot) = tokio::join!(self.face_count(), self.snapshot());
        Signals {
            face_count,
            snapshot,
        }
    }

    pub async fn face_count(&self) -> u32 {
        match self.face_count.face_count().await {
            Ok(reading) => {
                debug!("Face count: {} (seq {:?})", reading.count, reading.sequence);
                reading.count
            }
            Err(e) => {
                warn!("Face count unavailable, assuming 0: {}", e);
                0
            }
        }
    }

    pub async fn snapshot(&self) -> BrowserSnapshot {
        match self.browser.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Browser snapshot unavailable, assuming none: {}", e);
                BrowserSnapshot::default()
            }
        }
    }
}

#[async_trait]
impl SensitivityCheck for SignalHub {
    async fn is_sensitive(&self, content: &str, url: &str) -> bool {
        match self.oracle.is_sensitive(content, url).await {
            Ok(sensitive) => sensitive,
            Err(e) => {
                warn!("Sensitivity check failed, assuming not sensitive: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_clients::{FaceCountReading, SignalError};

    struct FixedCount(Result<u32, ()>);

    #[async_trait]
    impl FaceCountSource for FixedCount {
        async fn face_count(&self) -> Result<FaceCountReading, SignalError> {
            match self.0 {
                Ok(count) => Ok(FaceCountReading {
                    count,
                    ..Default::default()
                }),
                Err(()) => Err(SignalError::Timeout(3000)),
            }
        }
    }

    struct FixedSnapshot(Option<BrowserSnapshot>);

    #[async_trait]
    impl BrowserSource for FixedSnapshot {
        async fn snapshot(&self) -> Result<BrowserSnapshot, SignalError> {
            self.0
                .clone()
                .ok_or_else(|| SignalError::Transport("connection refused".to_string()))
        }
    }

    struct FixedVerdict(Result<bool, ()>);

    #[async_trait]
    impl SensitivityOracle for FixedVerdict {
        async fn is_sensitive(&self, _content: &str, _url: &str) -> Result<bool, SignalError> {
            self.0.map_err(|()| SignalError::Status(500))
        }
    }

    fn snapshot() -> BrowserSnapshot {
        BrowserSnapshot {
            url: "https://bank.example/acct".to_string(),
            title: String::new(),
            text_content: "Balance: $10,000".to_string(),
            timestamp: 5,
        }
    }

    #[tokio::test]
    async fn test_healthy_sources_pass_through() {
        let hub = SignalHub::new(
            Box::new(FixedCount(Ok(2))),
            Box::new(FixedSnapshot(Some(snapshot()))),
            Box::new(FixedVerdict(Ok(true))),
        );

        let signals = hub.gather().await;
        assert_eq!(signals.face_count, 2);
        assert_eq!(signals.snapshot, snapshot());
        assert!(hub.is_sensitive("Balance", "https://bank.example").await);
    }

    #[tokio::test]
    async fn test_failures_become_safe_defaults() {
        let hub = SignalHub::new(
            Box::new(FixedCount(Err(()))),
            Box::new(FixedSnapshot(None)),
            Box::new(FixedVerdict(Err(()))),
        );

        let signals = hub.gather().await;
        assert_eq!(signals, Signals::default());
        assert_eq!(signals.snapshot.timestamp, 0);
        assert!(!hub.is_sensitive("Balance", "https://bank.example").await);
    }
}
