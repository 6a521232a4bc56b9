/*!
 * Together AI client.
 *
 * Together exposes an OpenAI-compatible API: chat completions for story text
 * and translation, plus `images/generations` returning base64 images.
 */

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;

use super::{
    continuation_prompt, status_error, translation_system_prompt, GenerationProvider,
    ImageGenerationRequest, ImageGenerationResponse, TextGenerationRequest, TextGenerationResponse,
    TranslationProvider, TranslationRequest, TranslationResponse,
};

/// Default image model
pub const DEFAULT_IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-schnell";

/// Together client
#[derive(Debug, Clone)]
pub struct Together {
    client: Client,
    api_key: String,
    /// Base URL, e.g. `https://api.together.xyz/v1`
    endpoint: String,
    model: String,
    image_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct CompletionRequest {
    model: String,
    messages: Vec<CompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

impl CompletionResponse {
    /// Text of the first choice
    pub fn text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    width: u32,
    height: u32,
    steps: u32,
    n: u32,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageTimings {
    inference: f64,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    #[serde(default)]
    timings: Option<ImageTimings>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
    #[serde(default)]
    timings: Option<ImageTimings>,
}

impl Together {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1)))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_image_model(mut self, image_model: impl Into<String>) -> Self {
        self.image_model = image_model.into();
        self
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<String, ProviderError> {
        let url = format!("{}/{}", self.endpoint, path);
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            error!("Together API error ({}): {}", status, text);
            return Err(status_error(status, text));
        }
        Ok(text)
    }

    /// Run a chat completion and return the first choice's text
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = self.post("chat/completions", request).await?;
        let response: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::ParseError(e.to_string()))?;
        response
            .text()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("No choices in completion response".to_string()))
    }

    fn completion(&self, messages: Vec<CompletionMessage>, max_tokens: Option<u32>, temperature: f32) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature: Some(temperature),
        }
    }
}

fn message(role: &str, content: impl Into<String>) -> CompletionMessage {
    CompletionMessage {
        role: role.to_string(),
        content: content.into(),
    }
}

#[async_trait]
impl TranslationProvider for Together {
    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResponse, ProviderError> {
        let completion = self.completion(
            vec![
                message("system", translation_system_prompt(&request.source_language, &request.target_language)),
                message("user", request.source_text),
            ],
            None,
            0.3,
        );

        let text = self.complete(&completion).await?;
        debug!("Together translated into {}", request.target_language);
        Ok(TranslationResponse {
            translated_text: text.trim().to_string(),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let completion = self.completion(vec![message("user", "ping")], Some(1), 0.0);
        self.complete(&completion).await.map(|_| ())
    }
}

#[async_trait]
impl GenerationProvider for Together {
    async fn generate_text(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse, ProviderError> {
        let completion = self.completion(
            vec![message("user", continuation_prompt(&request))],
            Some(256),
            request.temperature,
        );
        let text = self.complete(&completion).await?;
        Ok(TextGenerationResponse { text })
    }

    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse, ProviderError> {
        let body = ImageRequest {
            model: &self.image_model,
            prompt: &request.prompt,
            width: request.width,
            height: request.height,
            steps: 4,
            n: 1,
            response_format: "b64_json",
        };

        let text = self.post("images/generations", &body).await?;
        parse_image_response(&text)
    }
}

fn parse_image_response(body: &str) -> Result<ImageGenerationResponse, ProviderError> {
    let response: ImageResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::ParseError(e.to_string()))?;

    let top_level = response.timings.map(|t| t.inference);
    let datum = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError("No image in response".to_string()))?;

    let b64_json = datum
        .b64_json
        .ok_or_else(|| ProviderError::ParseError("Image response has no b64_json".to_string()))?;

    Ok(ImageGenerationResponse {
        b64_json,
        inference_millis: datum.timings.map(|t| t.inference).or(top_level),
    })
}
