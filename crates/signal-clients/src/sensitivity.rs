//! LLM Sensitivity Checker
//!
//! Asks an OpenAI-compatible chat completion endpoint whether page content
//! is sensitive. The model is instructed to answer only "yes" or "no".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::{SensitivityOracle, SignalError};

/// Default timeout for sensitivity requests
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Content beyond this many characters is not sent
pub const MAX_CONTENT_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that determines if web content is sensitive. \
If the content contains personal, financial, confidential, or private information, answer 'yes'. \
Otherwise, answer 'no'. Respond with only 'yes' or 'no'.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Verdict from a raw model answer: sensitive iff it starts with "y"
pub fn verdict_from_answer(answer: &str) -> bool {
    answer.trim().to_lowercase().starts_with('y')
}

fn user_prompt(content: &str, url: &str) -> String {
    let truncated: String = content.chars().take(MAX_CONTENT_CHARS).collect();
    format!("URL: {url}\nContent: {truncated}\nIs the content sensitive?")
}

/// Chat-completion backed sensitivity checker
pub struct SensitivityChecker {
    /// Completion endpoint
    url: String,
    /// Model (or workspace) name sent with each request
    model: String,
    api_token: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
}

impl SensitivityChecker {
    /// Create a new checker
    pub fn new(url: &str, model: &str) -> Self {
        info!("Creating sensitivity checker for {} (model {})", url, model);
        Self {
            url: url.to_string(),
            model: model.to_string(),
            api_token: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            http: reqwest::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <token>` with each request
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the model for a verdict
    pub async fn check(&self, content: &str, url: &str) -> Result<bool, SignalError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(content, url),
                },
            ],
            temperature: 0.0,
        };

        let mut request = self.http.post(&self.url).timeout(self.timeout).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response: ChatResponse = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SignalError::from_http(e, self.timeout))?
            .json()
            .await
            .map_err(|e| SignalError::from_http(e, self.timeout))?;

        let answer = response
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| SignalError::Decode("completion has no choices".to_string()))?;

        let sensitive = verdict_from_answer(answer);
        let short_url: String = url.chars().take(50).collect();
        debug!("Sensitivity verdict {} for URL {}", sensitive, short_url);
        Ok(sensitive)
    }
}

#[async_trait]
impl SensitivityOracle for SensitivityChecker {
    async fn is_sensitive(&self, content: &str, url: &str) -> Result<bool, SignalError> {
        self.check(content, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[test]
    fn test_verdict_parsing() {
        assert!(verdict_from_answer("yes"));
        assert!(verdict_from_answer("  Yes.\n"));
        assert!(verdict_from_answer("Y"));
        assert!(!verdict_from_answer("no"));
        assert!(!verdict_from_answer(""));
        assert!(!verdict_from_answer("maybe yes"));
    }

    #[test]
    fn test_prompt_truncates_on_char_boundary() {
        let content = "é".repeat(MAX_CONTENT_CHARS + 10);
        let prompt = user_prompt(&content, "https://a.example");
        assert_eq!(prompt.matches('é').count(), MAX_CONTENT_CHARS);
        assert!(prompt.starts_with("URL: https://a.example\nContent: "));
        assert!(prompt.ends_with("\nIs the content sensitive?"));
    }

    #[test]
    fn test_request_shape() {
        let body = ChatRequest {
            model: "default",
            messages: vec![ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "default");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Yes"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(verdict_from_answer(&parsed.choices[0].message.content));
    }

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    /// Completion endpoint on loopback that records each request
    async fn completion_endpoint(status: StatusCode, reply: Value) -> (String, Captured) {
        let captured = Captured::default();
        let sink = captured.clone();
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                let reply = reply.clone();
                async move {
                    let auth = headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    sink.lock().unwrap().push((auth, body));
                    (status, Json(reply))
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (format!("http://{addr}/v1/chat/completions"), captured)
    }

    fn answer(text: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
    }

    #[tokio::test]
    async fn test_check_sends_both_messages() {
        let (url, captured) = completion_endpoint(StatusCode::OK, answer("Yes")).await;
        let checker = SensitivityChecker::new(&url, "workspace");

        assert!(checker.check("Balance: $10,000", "https://bank.example").await.unwrap());

        let requests = captured.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (auth, body) = &requests[0];
        assert!(auth.is_none());
        assert_eq!(body["model"], "workspace");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(
            body["messages"][1]["content"],
            "URL: https://bank.example\nContent: Balance: $10,000\nIs the content sensitive?"
        );
    }

    #[tokio::test]
    async fn test_check_sends_bearer_token() {
        let (url, captured) = completion_endpoint(StatusCode::OK, answer("no")).await;
        let checker = SensitivityChecker::new(&url, "default")
            .with_api_token(Some("secret".to_string()));

        assert!(!checker.check("weather", "https://news.example").await.unwrap());
        assert_eq!(
            captured.lock().unwrap()[0].0.as_deref(),
            Some("Bearer secret")
        );
    }

    #[tokio::test]
    async fn test_check_error_status() {
        let (url, _) =
            completion_endpoint(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "down"})).await;
        let checker = SensitivityChecker::new(&url, "default");

        assert!(matches!(
            checker.check("text", "https://a.example").await,
            Err(SignalError::Status(500))
        ));
    }

    #[tokio::test]
    async fn test_check_without_choices() {
        let (url, _) = completion_endpoint(StatusCode::OK, json!({"choices": []})).await;
        let checker = SensitivityChecker::new(&url, "default");

        assert!(matches!(
            checker.check("text", "https://a.example").await,
            Err(SignalError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_token_ignored() {
        let checker = SensitivityChecker::new("http://localhost:3001", "default")
            .with_api_token(Some(String::new()));
        assert!(checker.api_token.is_none());
    }
}
