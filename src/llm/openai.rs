use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::media::ImagePayload;
use crate::utils::http::get_http_client;
use crate::utils::text::truncate_for_log;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model endpoint rejected the credentials (401)")]
    Unauthorized,
    #[error("model endpoint is rate limiting requests (429)")]
    RateLimited,
    #[error("model request failed with status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// One role-tagged exchange: a system prompt plus a user turn with text and
/// optional images.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub operation: &'static str,
    pub model: String,
    pub system_prompt: String,
    pub user_text: String,
    pub images: Vec<ImagePayload>,
    pub temperature: f32,
    pub json_output: bool,
}

pub trait ModelClient: Send + Sync {
    /// Returns the first choice's text, or `None` when the response carries
    /// no content. Never retries.
    fn complete(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<Option<String>, LlmError>> + Send;
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value.pointer("/error/message").and_then(|v| v.as_str()) {
            return truncate_for_log(message, 500);
        }
        return truncate_for_log(&value.to_string(), 500);
    }

    truncate_for_log(trimmed, 500)
}

pub fn classify_status(status: StatusCode, body: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED => LlmError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited,
        _ => LlmError::Status {
            status: status.as_u16(),
            detail: summarize_error_body(body),
        },
    }
}

fn build_user_content(request: &ChatRequest) -> Value {
    if request.images.is_empty() {
        return Value::String(request.user_text.clone());
    }

    let mut parts = vec![json!({ "type": "text", "text": request.user_text })];
    for image in &request.images {
        parts.push(json!({
            "type": "image_url",
            "image_url": { "url": image.data_url() }
        }));
    }
    Value::Array(parts)
}

pub fn build_payload(request: &ChatRequest) -> Value {
    let mut payload = json!({
        "model": request.model,
        "temperature": request.temperature,
        "messages": [
            { "role": "system", "content": request.system_prompt },
            { "role": "user", "content": build_user_content(request) }
        ]
    });
    if request.json_output {
        payload["response_format"] = json!({ "type": "json_object" });
    }
    payload
}

pub fn extract_content(response: &Value) -> Option<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.openai_base_url,
            &config.openai_api_key,
            Duration::from_secs(config.openai_timeout_seconds),
        )
    }

    async fn post_chat_completion(&self, payload: &Value) -> Result<Value, LlmError> {
        let response = get_http_client()
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, &body);
            warn!("Chat completion failed: {err}");
            return Err(err);
        }

        Ok(response.json::<Value>().await?)
    }
}

impl ModelClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<Option<String>, LlmError> {
        let payload = build_payload(&request);
        debug!(
            "Chat completion request: operation={} model={} images={} json_output={}",
            request.operation,
            request.model,
            request.images.len(),
            request.json_output
        );

        let response = log_llm_timing(
            "openai",
            &request.model,
            request.operation,
            request.images.len(),
            || self.post_chat_completion(&payload),
        )
        .await?;

        let content = extract_content(&response);
        if content.is_none() {
            warn!(
                "Chat completion returned no content: {}",
                truncate_for_log(&response.to_string(), 1000)
            );
        }
        Ok(content)
    }
}
