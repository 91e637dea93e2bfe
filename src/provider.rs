//! Generation Backend Abstraction
//!
//! The orchestrator only ever sees `GenerationBackend::generate`. The concrete
//! client talks to any OpenAI-compatible `/chat/completions` endpoint.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One generation call. Opaque to the orchestrator beyond passing it through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Unique per section and chapter, e.g. `ch02-2.3.1`
    pub id: String,
    pub prompt_payload: String,
    pub system_context: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text generation collaborator
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ApiError>;

    /// Name used in logs
    fn backend_name(&self) -> &str;
}

// OpenAI-compatible API request/response structures
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// Helper function to map HTTP errors to ApiError
pub(crate) fn map_http_error(error: reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        match status.as_u16() {
            401 | 403 => ApiError::ProviderAuthFailed(format!("Authentication failed: {}", error)),
            429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", error)),
            _ => ApiError::ProviderRequestFailed(format!(
                "Request failed with status {}: {}",
                status, error
            )),
        }
    } else if error.is_timeout() {
        ApiError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        ApiError::ProviderError(format!("HTTP error: {}", error))
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_http_client(request_timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

/// Client for any OpenAI-compatible chat completions endpoint
pub struct OpenAiCompatibleClient {
    client: Client,
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        if model.trim().is_empty() {
            return Err(ApiError::ConfigError("Model name cannot be empty".to_string()));
        }
        let client = build_http_client(request_timeout)?;
        let base_url = base_url
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            model,
            api_key,
            base_url,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatibleClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_context,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt_payload,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await.map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                401 | 403 => {
                    ApiError::ProviderAuthFailed(format!("Authentication failed: {}", error_text))
                }
                429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", error_text)),
                _ => ApiError::ProviderRequestFailed(format!(
                    "Request failed with status {}: {}",
                    status, error_text
                )),
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ApiError::ProviderError("Empty completion in response".to_string()))
    }

    fn backend_name(&self) -> &str {
        "openai-compatible"
    }
}

// Mock backend for unit tests
#[cfg(test)]
pub struct MockBackend {
    fail_ids: Vec<String>,
    body: String,
    calls: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockBackend {
    pub fn new(body: &str) -> Self {
        Self {
            fail_ids: Vec::new(),
            body: body.to_string(),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Fail every request whose id ends with one of `suffixes`
    pub fn failing_on(mut self, suffixes: &[&str]) -> Self {
        self.fail_ids = suffixes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        self.calls.lock().push(request.id.clone());
        if self.fail_ids.iter().any(|s| request.id.ends_with(s.as_str())) {
            return Err(ApiError::ProviderRequestFailed(format!(
                "scripted failure for {}",
                request.id
            )));
        }
        Ok(self.body.clone())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}
