/*!
 * Provider implementations for translation and story generation.
 *
 * This module contains the collaborator contracts and their clients:
 * - Ollama: Local LLM server
 * - Together: OpenAI-compatible hosted API with image generation
 * - Mock: deterministic in-process provider for tests and offline runs
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single translation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
}

impl TranslationRequest {
    pub fn new(
        source_text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }
}

/// The translated text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translated_text: String,
}

/// A story continuation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationRequest {
    /// What should happen next
    pub prompt: String,
    /// The prompt the story was started from
    pub story_prompt: String,
    /// Story text so far
    pub prior_context: String,
    /// Language to write in
    pub language: String,
    /// Approximate length of the continuation
    pub max_words: usize,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationResponse {
    pub text: String,
}

/// An illustration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

impl ImageGenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            width: 1024,
            height: 768,
        }
    }
}

/// Base64 image data with the generator's inference time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub b64_json: String,
    pub inference_millis: Option<f64>,
}

/// Translation collaborator
#[async_trait]
pub trait TranslationProvider: Send + Sync + Debug {
    /// Translate one text
    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Story text and illustration collaborator
#[async_trait]
pub trait GenerationProvider: Send + Sync + Debug {
    async fn generate_text(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse, ProviderError>;

    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse, ProviderError>;
}

/// System prompt for block translation
pub(crate) fn translation_system_prompt(source_language: &str, target_language: &str) -> String {
    format!(
        "You are a professional translator of children's stories. Translate the user's text from {} to {}. \
         Preserve any HTML markup, keep the tone and meaning, and reply with the translation only.",
        source_language, target_language
    )
}

/// User prompt for a story continuation
pub(crate) fn continuation_prompt(request: &TextGenerationRequest) -> String {
    format!(
        "You are a creative children's story writer. Write in {language}.\n\n\
         Initial story prompt: {story}\n\n\
         Previous story content:\n{previous}\n\n\
         Continue this story in {language} with approximately {words} words: {prompt}\n\n\
         Remember to keep your response close to {words} words.",
        language = request.language,
        story = request.story_prompt,
        previous = request.prior_context,
        words = request.max_words,
        prompt = request.prompt,
    )
}

/// Map an HTTP failure status to the matching provider error
pub(crate) fn status_error(status: reqwest::StatusCode, message: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationError(message),
        429 => ProviderError::RateLimitExceeded(message),
        code => ProviderError::ApiError {
            status_code: code,
            message,
        },
    }
}

pub mod mock;
pub mod ollama;
pub mod together;
