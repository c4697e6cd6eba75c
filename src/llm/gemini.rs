//! Gemini `generateContent` REST provider.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{LlmError, TextGenerator, Turn};
use crate::config::{get_gemini_http_timeout_secs, GEMINI_MODEL};
use crate::utils::truncate_str;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Maximum number of error-body characters carried into an [`LlmError`]
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client for the Gemini REST API.
///
/// Holds one [`reqwest::Client`] for the lifetime of the process; the API key
/// travels as a query parameter, which is why request URLs must never be
/// logged verbatim.
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    /// Create a client with the configured request timeout
    #[must_use]
    pub fn new(api_key: String) -> Self {
        let timeout = Duration::from_secs(get_gemini_http_timeout_secs());
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http_client,
            api_key,
        }
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, LlmError> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            // Gateways in front of the API answer with HTML pages on overload;
            // those are noise, not a usable error message.
            let looks_like_html = error_text.trim_start().starts_with("<!DOCTYPE")
                || error_text.trim_start().starts_with("<html");
            let detail = if looks_like_html {
                "HTML error page returned".to_string()
            } else {
                truncate_str(error_text, MAX_ERROR_BODY_CHARS)
            };
            return Err(LlmError::ApiError(format!("{status}: {detail}")));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::JsonError(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_content(&self, transcript: &[Turn]) -> Result<String, LlmError> {
        let url = format!(
            "{GEMINI_API_BASE}/{GEMINI_MODEL}:generateContent?key={}",
            self.api_key
        );
        let body = build_request_body(transcript);

        debug!(turns = transcript.len(), model = GEMINI_MODEL, "calling Gemini");
        let response = self.post_json(&url, &body).await?;
        extract_candidate_text(&response)
    }
}

/// Assemble the request body: the full transcript as `contents` plus safety
/// settings that disable every blocking category.
fn build_request_body(transcript: &[Turn]) -> Value {
    json!({
        "contents": transcript,
        "safetySettings": [
            {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"},
            {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE"},
            {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE"},
            {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE"}
        ]
    })
}

/// Pull the generated text out of the first candidate.
fn extract_candidate_text(response: &Value) -> Result<String, LlmError> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            LlmError::ApiError(format!(
                "no candidate text in response: {}",
                truncate_str(response.to_string(), MAX_ERROR_BODY_CHARS)
            ))
        })
}
