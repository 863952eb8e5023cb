//! OpenAI-compatible provider client
//!
//! Supports any provider with an OpenAI-compatible chat completions API
//! (OpenAI, Azure, LocalAI, vLLM, ...). [`OpenAIDocGenerator`] plugs the
//! client into the Docsweep pipeline as its documentation generator.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

pub mod generator;
pub mod prompts;

pub use generator::OpenAIDocGenerator;
pub use prompts::*;

/// Environment variable read for the API key unless another name is given
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the default request timeout
pub const TIMEOUT_ENV: &str = "DOCSWEEP_OPENAI_TIMEOUT_SECONDS";

const MAX_ERROR_MESSAGE_CHARS: usize = 256;

/// Errors from the OpenAI-compatible client
#[derive(Error, Debug)]
pub enum ClientError {
    /// The configured base URL does not parse
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The API key cannot be sent as a header value
    #[error("Invalid API key characters")]
    InvalidApiKey,

    /// The request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a structured error
    #[error("API error ({status}): {message} ({error_type})")]
    Api {
        /// HTTP status
        status: u16,
        /// Sanitized provider message
        message: String,
        /// Provider error type
        error_type: String,
    },

    /// The provider answered with a non-success status and no usable body
    #[error("HTTP error {status}: {reason}")]
    Status {
        /// HTTP status
        status: u16,
        /// Canonical reason phrase
        reason: String,
    },
}

impl ClientError {
    /// Whether the provider cannot be used at all (unreachable or rejecting our credentials)
    pub fn is_unavailable(&self) -> bool {
        let auth_rejected = |status: u16| {
            status == StatusCode::UNAUTHORIZED.as_u16() || status == StatusCode::FORBIDDEN.as_u16()
        };
        match self {
            ClientError::Http(e) => e.is_connect(),
            ClientError::Api { status, .. } | ClientError::Status { status, .. } => {
                auth_rejected(*status)
            }
            ClientError::InvalidUrl(_) | ClientError::InvalidApiKey => true,
        }
    }
}

/// OpenAI-compatible client
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    base_url: Url,
    api_key: SecretString,
    http: reqwest::Client,
    default_model: String,
}

/// Configuration for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API (e.g. "https://api.openai.com/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: SecretString,
    /// Default model to use for requests
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Sampling temperature for documentation requests
    pub temperature: f32,
    /// Maximum tokens per documentation response
    pub max_tokens: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: SecretString::new("".into()),
            default_model: "gpt-4o-mini".to_string(),
            timeout_seconds: get_default_timeout(),
            temperature: 0.0,
            max_tokens: 4000,
        }
    }
}

impl ClientConfig {
    /// Take the API key from environment variable `var`, leaving it empty when unset
    pub fn with_api_key_from_env(mut self, var: &str) -> Self {
        if let Ok(key) = std::env::var(var) {
            self.api_key = SecretString::from(key.trim().to_string());
        }
        self
    }
}

/// Get the default timeout from environment variable or use the default value
fn get_default_timeout() -> u64 {
    std::env::var(TIMEOUT_ENV)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(120)
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// ID of the model to use
    pub model: String,
    /// List of messages in the conversation
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Content of the message; providers may send `null`
    #[serde(default)]
    pub content: Option<String>,
}

impl Message {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
        }
    }
}

/// Role of the message author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Unique ID of the response
    #[serde(default)]
    pub id: String,
    /// Model used for generation
    #[serde(default)]
    pub model: String,
    /// List of generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Option<Usage>,
}

/// Generated choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Index of the choice
    #[serde(default)]
    pub index: i32,
    /// Generated message
    pub message: Message,
    /// Reason for finishing (e.g. "stop", "length")
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: i32,
    /// Tokens in the completion
    pub completion_tokens: i32,
    /// Total tokens used
    pub total_tokens: i32,
}

/// API error response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Detailed error information
    pub error: ErrorDetail,
}

/// Detailed error information
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    pub code: Option<String>,
}

impl OpenAIClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)?;

        // Log the host only, never the key
        info!(
            "Creating OpenAI client for URL: {}",
            base_url.host_str().unwrap_or("unknown")
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url,
            api_key: config.api_key,
            http,
            default_model: config.default_model,
        })
    }

    /// Get the default model configured for this client
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Whether a non-empty API key is configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    /// Build request headers
    fn build_headers(&self) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();

        let api_key_val = HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret()))
            .map_err(|_| ClientError::InvalidApiKey)?;

        headers.insert(header::AUTHORIZATION, api_key_val);

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(headers)
    }

    /// `path` appended to the base URL without dropping its last segment
    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        // Url::join replaces the last segment unless the base ends with '/'
        let mut base = self.base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?.join(path)?)
    }

    /// Send a chat completion request
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ClientError> {
        let url = self.endpoint("chat/completions")?;
        let headers = self.build_headers()?;

        debug!("Sending chat request to {}", url);

        let response = self
            .http
            .post(url)
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let chat_response: ChatResponse = response.json().await?;
            info!(
                "Chat completion successful: {} tokens used",
                chat_response
                    .usage
                    .as_ref()
                    .map(|u| u.total_tokens)
                    .unwrap_or(0)
            );
            return Ok(chat_response);
        }

        let error_text = response.text().await.unwrap_or_default();
        error!(
            "API error ({}): {}",
            status,
            sanitize_error_message(&error_text)
        );

        match serde_json::from_str::<ApiError>(&error_text) {
            Ok(api_error) => Err(ClientError::Api {
                status: status.as_u16(),
                message: sanitize_error_message(&api_error.error.message),
                error_type: api_error.error.error_type,
            }),
            Err(_) => Err(ClientError::Status {
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            }),
        }
    }
}

/// Sanitize error messages to prevent information disclosure
pub fn sanitize_error_message(message: &str) -> String {
    let patterns = [
        (r"(?i)bearer\s+[A-Za-z0-9_\-.=]+", "Bearer ***"),
        (r"sk-(?:proj-)?[A-Za-z0-9_\-]{20,}", "sk-***"),
        (r"gh[pousr]_[A-Za-z0-9_]{36,}", "ghp_***"),
        (r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b", "AKIA***"),
        (r"[A-Za-z0-9_\-]{32,}", "***REDACTED***"),
    ];

    let mut sanitized = message.to_string();

    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            sanitized = re.replace_all(&sanitized, replacement).to_string();
        }
    }

    if sanitized.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        let head: String = sanitized.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        format!("{head}... [truncated]")
    } else {
        sanitized
    }
}
