/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with a tagged translation
 * - `MockProvider::intermittent(n)` - Fails every nth request
 * - `MockProvider::failing()` - Always fails with an error
 *
 * Translations are rendered as `"[{target}] {text}"` so tests can predict them.
 */

use async_trait::async_trait;
use base64::Engine;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;

use super::{
    GenerationProvider, ImageGenerationRequest, ImageGenerationResponse, TextGenerationRequest,
    TextGenerationResponse, TranslationProvider, TranslationRequest, TranslationResponse,
};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty text
    Empty,
    /// Succeeds after a delay
    Slow { delay_ms: u64 },
}

/// A 1x1 transparent PNG
pub const MOCK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Mock provider for translation and generation
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Shared across clones
    request_count: Arc<AtomicUsize>,
    /// Source texts that always fail, whatever the behavior
    failing_texts: Arc<HashSet<String>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            failing_texts: Arc::new(HashSet::new()),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Fail every request whose text is one of `texts`
    pub fn failing_on<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_texts = Arc::new(texts.into_iter().map(Into::into).collect());
        self
    }

    /// Number of requests received so far
    pub fn calls(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// The text a working mock produces for `text` in `target_language`
    pub fn expected_translation(text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, text)
    }

    /// Apply the configured behavior to a successful result
    async fn respond(&self, input: &str, success: String) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        if self.failing_texts.contains(input) {
            return Err(ProviderError::ApiError {
                message: format!("Simulated failure for '{}'", input),
                status_code: 500,
            });
        }

        match self.behavior {
            MockBehavior::Working => Ok(success),
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(success)
                }
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),
            MockBehavior::Empty => Ok(String::new()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(success)
            }
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::working()
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResponse, ProviderError> {
        let success = Self::expected_translation(&request.source_text, &request.target_language);
        let translated_text = self.respond(&request.source_text, success).await?;
        Ok(TranslationResponse { translated_text })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Mock is offline".to_string())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate_text(&self, request: TextGenerationRequest) -> Result<TextGenerationResponse, ProviderError> {
        let success = format!("{} And then {}.", request.story_prompt, request.prompt)
            .trim()
            .to_string();
        let text = self.respond(&request.prompt, success).await?;
        Ok(TextGenerationResponse { text })
    }

    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse, ProviderError> {
        let b64_json = self.respond(&request.prompt, MOCK_PNG_BASE64.to_string()).await?;
        if !b64_json.is_empty() {
            base64::engine::general_purpose::STANDARD
                .decode(&b64_json)
                .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        }
        Ok(ImageGenerationResponse {
            b64_json,
            inference_millis: Some(1.0),
        })
    }
}
