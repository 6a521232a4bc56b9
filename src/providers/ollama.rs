use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;

use super::{
    continuation_prompt, status_error, translation_system_prompt, GenerationProvider,
    ImageGenerationRequest, ImageGenerationResponse, TextGenerationRequest, TextGenerationResponse,
    TranslationProvider, TranslationRequest, TranslationResponse,
};

/// Ollama client for interacting with Ollama API
#[derive(Debug, Clone)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model used for every request
    model: String,
    /// HTTP client for making requests
    client: Client,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
    temperature: Option<f32>,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Chat response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    pub message: ChatMessage,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: None,
            stream: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(max_tokens);
        self
    }

    /// Disable streaming
    pub fn no_stream(mut self) -> Self {
        self.stream = Some(false);
        self
    }
}

impl Ollama {
    /// Create a new Ollama client for an endpoint such as `http://localhost:11434`
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: normalize_base_url(&endpoint.into(), 11434),
            model: model.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1)))
                // Ollama speaks HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
            max_retries: 3,
            backoff_base_ms: 1000,
            temperature: None,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat with the Ollama API, retrying server and network errors
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }

            let response = match self.client.post(&url).json(request).send().await {
                Ok(response) => response,
                Err(e) => {
                    error!(
                        "Ollama API network error: {} - attempt {}/{}",
                        e,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(ProviderError::ConnectionError(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
                return parse_chat_body(&body);
            }

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);

            if status.is_server_error() {
                last_error = Some(status_error(status, error_text));
            } else {
                return Err(status_error(status, error_text));
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed(format!(
                "Ollama API request failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        response["version"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let request = ChatRequest::new(self.model.clone(), messages).no_stream();
        match self.temperature {
            Some(t) => request.temperature(t),
            None => request,
        }
    }
}

#[async_trait]
impl TranslationProvider for Ollama {
    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResponse, ProviderError> {
        let chat = self.request(vec![
            ChatMessage::system(translation_system_prompt(&request.source_language, &request.target_language)),
            ChatMessage::user(request.source_text),
        ]);

        let response = self.chat(&chat).await?;
        debug!("Ollama translated into {} ({:?} tokens)", request.target_language, response.eval_count);
        Ok(TranslationResponse {
            translated_text: response.message.content.trim().to_string(),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.version().await.map(|_| ())
    }
}

#[async_trait]
impl GenerationProvider for Ollama {
    async fn generate_text(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse, ProviderError> {
        let chat = self
            .request(vec![ChatMessage::user(continuation_prompt(&request))])
            .temperature(request.temperature)
            .max_tokens(256);

        let response = self.chat(&chat).await?;
        Ok(TextGenerationResponse {
            text: response.message.content,
        })
    }

    async fn generate_image(&self, _request: ImageGenerationRequest) -> Result<ImageGenerationResponse, ProviderError> {
        Err(ProviderError::Unsupported("Ollama does not generate images".to_string()))
    }
}

/// Add a scheme and default port when the endpoint has none
fn normalize_base_url(host: &str, port: u16) -> String {
    let host = host.trim_end_matches('/');
    match host.split_once("://") {
        Some((scheme, rest)) if rest.contains(':') => format!("{}://{}", scheme, rest),
        Some((scheme, rest)) => format!("{}://{}:{}", scheme, rest, port),
        None if host.contains(':') => format!("http://{}", host),
        None => format!("http://{}:{}", host, port),
    }
}

/// Parse a chat body, falling back to concatenating a JSONL stream
fn parse_chat_body(body: &str) -> Result<ChatResponse, ProviderError> {
    if let Ok(response) = serde_json::from_str::<ChatResponse>(body) {
        return Ok(response);
    }

    let mut content = String::new();
    let mut model = None;
    let mut done = false;
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            let preview: String = body.chars().take(500).collect();
            error!("Failed to parse Ollama API chat response: {}. Raw response: {}", e, preview);
            ProviderError::ParseError(e.to_string())
        })?;

        if let Some(part) = value.pointer("/message/content").and_then(|v| v.as_str()) {
            content.push_str(part);
        }
        if model.is_none() {
            model = value.get("model").and_then(|v| v.as_str()).map(str::to_string);
        }
        done |= value.get("done").and_then(|v| v.as_bool()).unwrap_or(false);
    }

    if model.is_none() && content.is_empty() {
        return Err(ProviderError::ParseError("Empty response from Ollama".to_string()));
    }

    Ok(ChatResponse {
        model: model.unwrap_or_else(|| "unknown".to_string()),
        created_at: String::new(),
        message: ChatMessage {
            role: "assistant".to_string(),
            content,
        },
        done,
        eval_count: None,
    })
}
