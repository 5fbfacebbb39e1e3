// OpenAI-compatible chat-completions client shared by chat translators and
// vision recognizers. One request per call; retries belong to the dispatcher.

use anyhow::Context;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::errors::{ConfigError, ServiceError, ServiceResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying an image (data URL) followed by a text instruction
    pub fn user_with_image(data_url: String, text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
                ContentPart::Text { text: text.into() },
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

/// Where and how to call one provider
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub base_url: &'a str,
    pub api_key: Option<&'a str>,
    pub model: &'a str,
}

/// Check that a base URL is an absolute http(s) URL.
pub fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(base_url.trim())
        .map_err(|e| ConfigError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        _ => Err(ConfigError::InvalidBaseUrl(base_url.to_string())),
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim().trim_end_matches('/'))
}

pub struct ChatClient {
    http_client: reqwest::Client,
}

impl ChatClient {
    pub fn new() -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http_client })
    }

    /// Send one chat completion and return the first choice's content.
    ///
    /// 401/403/404 and malformed URLs are configuration errors; 429, 5xx,
    /// timeouts and connection failures are transient.
    pub async fn complete(
        &self,
        service: &str,
        endpoint: Endpoint<'_>,
        messages: &[ChatMessage],
        json_response: bool,
    ) -> ServiceResult<String> {
        validate_base_url(endpoint.base_url)
            .map_err(|e| ServiceError::configuration(service, e.to_string()))?;

        let request = ChatCompletionRequest {
            model: endpoint.model,
            messages,
            stream: false,
            temperature: 0.3,
            response_format: json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let mut builder = self
            .http_client
            .post(completions_url(endpoint.base_url))
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = endpoint.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| map_send_error(service, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(service, status, &body));
        }

        let data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::transient(service, format!("invalid response body: {e}")))?;

        if let Some(usage) = &data.usage {
            debug!("{}: {} tokens", service, usage.total_tokens);
        }

        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ServiceError::transient(service, "response contained no choices"))
    }
}

fn map_send_error(service: &str, error: reqwest::Error) -> ServiceError {
    if error.is_builder() {
        ServiceError::configuration(service, format!("invalid base URL: {error}"))
    } else if error.is_timeout() {
        ServiceError::transient(service, format!("request timed out: {error}"))
    } else if error.is_connect() {
        ServiceError::transient(service, format!("connection failed: {error}"))
    } else {
        ServiceError::classify(service, error.to_string())
    }
}

fn map_status(service: &str, status: StatusCode, body: &str) -> ServiceError {
    let message = format!("HTTP {} - {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ServiceError::configuration(service, format!("authentication failed: {message}"))
        }
        StatusCode::NOT_FOUND => {
            ServiceError::configuration(service, format!("endpoint not found, check base URL: {message}"))
        }
        StatusCode::TOO_MANY_REQUESTS => ServiceError::transient(service, message),
        s if s.is_server_error() => ServiceError::transient(service, message),
        _ => ServiceError::classify(service, message),
    }
}

/// Pull a string field out of a model reply that was asked to answer in JSON.
///
/// Tries a strict parse, then the same after stripping markdown code fences,
/// then a regex over the raw text. Returns `None` when all three fail.
pub fn extract_json_field(content: &str, field: &str) -> Option<String> {
    let from_value = |raw: &str| {
        serde_json::from_str::<serde_json::Value>(raw)
            .ok()
            .and_then(|v| v.get(field).and_then(|f| f.as_str()).map(str::to_string))
    };

    if let Some(text) = from_value(content.trim()) {
        return Some(text);
    }

    let unfenced = strip_code_fence(content);
    if let Some(text) = from_value(unfenced) {
        return Some(text);
    }

    let pattern = format!(r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)""#, regex::escape(field));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("Invalid extraction pattern for {}: {}", field, e);
            return None;
        }
    };
    re.captures(content).and_then(|caps| {
        let escaped = caps.get(1)?.as_str();
        serde_json::from_str::<String>(&format!("\"{escaped}\""))
            .ok()
            .or_else(|| Some(escaped.to_string()))
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().trim_end_matches("```").trim()
}
