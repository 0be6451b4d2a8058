// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! OpenAI chat-completions scorer
//!
//! Synchronous client for `/v1/chat/completions`. HTTP failures are mapped onto
//! the [`ScoringError`] taxonomy so the retry layer can tell what is worth
//! retrying.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScoringError;
use crate::rubric::Prompt;
use crate::scorer::Scorer;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Sampling temperature used for every request
pub const TEMPERATURE: f32 = 0.3;

/// Reply length cap
pub const MAX_TOKENS: u32 = 1000;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Scorer backed by an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiScorer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiScorer {
    /// Create a scorer for `model` against the default endpoint
    ///
    /// # Errors
    ///
    /// Returns `ScoringError::Transient` if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ScoringError> {
        Self::with_timeout(api_key, model, DEFAULT_TIMEOUT)
    }

    /// Create a scorer with a custom request timeout
    ///
    /// # Errors
    ///
    /// Returns `ScoringError::Transient` if the HTTP client cannot be built.
    pub fn with_timeout(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .user_agent(concat!("mergescore/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ScoringError::transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the scorer at a compatible provider
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Endpoint URL used for requests
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

impl Scorer for OpenAiScorer {
    fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &Prompt) -> Result<String, ScoringError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        debug!(model = %self.model, bytes = prompt.user.len(), "Calling chat completions");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| ScoringError::transient(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        let body = response
            .text()
            .map_err(|e| ScoringError::transient(describe(&e)))?;
        extract_content(&body)
    }
}

/// Map a non-success HTTP status onto the error taxonomy
fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ScoringError {
    let message = format!("{status}: {}", body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ScoringError::Auth { message },
        StatusCode::TOO_MANY_REQUESTS => ScoringError::RateLimited { retry_after },
        StatusCode::REQUEST_TIMEOUT => ScoringError::transient(message),
        s if s.is_server_error() => ScoringError::transient(message),
        _ => ScoringError::malformed(format!("unexpected HTTP status {message}")),
    }
}

/// Pull `choices[0].message.content` out of a success body
fn extract_content(body: &str) -> Result<String, ScoringError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ScoringError::malformed(format!("unreadable completion body: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ScoringError::malformed("completion has no message content"))
}

/// `Retry-After` in delta-seconds form
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
