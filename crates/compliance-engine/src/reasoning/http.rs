//! OpenAI-compatible chat completions client.

use super::{prompts, EvaluationRequest, ReasoningClient};
use crate::config::ReasoningConfig;
use crate::error::ReasoningError;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

pub struct HttpReasoningClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f64,
    limiter: DirectLimiter,
}

impl HttpReasoningClient {
    /// Build a client, reading the API key from the configured environment variable.
    ///
    /// # Errors
    /// `AuthFailure` when the variable is unset or empty,
    /// `TransportFailure` when the HTTP client cannot be built.
    pub fn from_config(config: &ReasoningConfig) -> Result<Self, ReasoningError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ReasoningError::AuthFailure(format!(
                    "environment variable {} is not set",
                    config.api_key_env
                ))
            })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &ReasoningConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ReasoningError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ReasoningError::TransportFailure(format!("http client: {}", e)))?;
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }
}

#[async_trait]
impl ReasoningClient for HttpReasoningClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn evaluate(&self, request: &EvaluationRequest<'_>) -> Result<String, ReasoningError> {
        self.limiter.until_ready().await;

        let (system, user) = prompts::render(request);
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReasoningError::TransportFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReasoningError::TransportFailure(e.to_string()))?;
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ReasoningError::malformed(format!("unexpected provider envelope: {}", e), &body)
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ReasoningError::malformed("provider returned no message content", &body))
    }
}

/// Map an unsuccessful provider status to the error taxonomy.
///
/// Client errors other than auth, quota, rate limiting and request timeout
/// are permanent for that request: they are not retried and end up as an
/// analysis error for the one obligation or set that caused them.
pub fn classify_status(status: StatusCode, body: &str) -> ReasoningError {
    let snippet: String = body.chars().take(300).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ReasoningError::AuthFailure(format!("{}: {}", status, snippet))
        }
        StatusCode::PAYMENT_REQUIRED => {
            ReasoningError::QuotaExceeded(format!("{}: {}", status, snippet))
        }
        StatusCode::TOO_MANY_REQUESTS if body.contains("insufficient_quota") => {
            ReasoningError::QuotaExceeded(format!("{}: {}", status, snippet))
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            ReasoningError::TransportFailure(format!("{}: {}", status, snippet))
        }
        _ if status.is_client_error() => {
            ReasoningError::RequestRejected(format!("{}: {}", status, snippet))
        }
        _ => ReasoningError::TransportFailure(format!("{}: {}", status, snippet)),
    }
}
