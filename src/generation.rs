/*!
 * Story writing on top of the translation orchestrator.
 *
 * Generated text and images are appended to the default language; the
 * orchestrator mirrors them into every derived variant and the next
 * synchronization translates the new text.
 */

use std::sync::Arc;

use base64::Engine;
use log::{debug, info};
use uuid::Uuid;

use crate::content::{Block, ImagePayload, Page};
use crate::errors::{GenerationError, TranslationError};
use crate::providers::{GenerationProvider, ImageGenerationRequest, TextGenerationRequest};
use crate::translation::TranslationOrchestrator;

/// Knobs for text generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// The prompt the story was started from
    pub story_prompt: String,
    /// Continuations are cut to this many words
    pub max_words: usize,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            story_prompt: String::new(),
            max_words: 200,
            temperature: 0.7,
        }
    }
}

/// Position of a newly generated block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedBlock {
    pub page: usize,
    pub block: usize,
}

/// Writes story text and illustrations into the default language
#[derive(Debug, Clone)]
pub struct StoryGenerator {
    orchestrator: TranslationOrchestrator,
    provider: Arc<dyn GenerationProvider>,
    settings: GenerationSettings,
}

impl StoryGenerator {
    pub fn new(
        orchestrator: TranslationOrchestrator,
        provider: Arc<dyn GenerationProvider>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            orchestrator,
            provider,
            settings,
        }
    }

    pub fn orchestrator(&self) -> &TranslationOrchestrator {
        &self.orchestrator
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Append an opening page with one empty text block. Returns its index.
    pub fn start_story(&self) -> usize {
        let block = Block::text("").with_id(Uuid::new_v4().to_string());
        self.orchestrator.append_page(Page::new(vec![block]))
    }

    /// Default-language text of pages `0..=page_index`, one block per line
    pub fn prior_context(&self, page_index: usize) -> Result<String, GenerationError> {
        let pages = self.orchestrator.snapshot(&self.orchestrator.default_language())?;
        if page_index >= pages.len() {
            return Err(crate::errors::ContentError::PageOutOfRange {
                index: page_index,
                count: pages.len(),
            }
            .into());
        }

        Ok(pages[..=page_index]
            .iter()
            .flat_map(Page::texts)
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Ask the collaborator to continue the story and append the reply as a
    /// new text block on `page_index`. Nothing changes on failure.
    pub async fn continue_story(&self, page_index: usize, prompt: &str) -> Result<GeneratedBlock, GenerationError> {
        let prior_context = self.prior_context(page_index)?;
        let request = TextGenerationRequest {
            prompt: prompt.to_string(),
            story_prompt: self.settings.story_prompt.clone(),
            prior_context,
            language: self.orchestrator.default_language(),
            max_words: self.settings.max_words,
            temperature: self.settings.temperature,
        };

        let response = self.provider.generate_text(request).await?;
        let text = truncate_words(&response.text, self.settings.max_words);
        if text.is_empty() {
            return Err(GenerationError::Malformed("Empty continuation".to_string()));
        }

        let block = Block::text(text).with_id(Uuid::new_v4().to_string());
        let index = self.orchestrator.append_block(page_index, block)?;
        self.orchestrator
            .mark_dirty(page_index, index)
            .map_err(|e| match e {
                TranslationError::Content(e) => GenerationError::Content(e),
                other => GenerationError::Malformed(other.to_string()),
            })?;

        info!("Added continuation to page {} as block {}", page_index, index);
        Ok(GeneratedBlock {
            page: page_index,
            block: index,
        })
    }

    /// Generate an illustration and append it to `page_index`
    pub async fn generate_image(&self, page_index: usize, prompt: &str) -> Result<GeneratedBlock, GenerationError> {
        let count = self.orchestrator.page_count();
        if page_index >= count {
            return Err(crate::errors::ContentError::PageOutOfRange {
                index: page_index,
                count,
            }
            .into());
        }

        let response = self
            .provider
            .generate_image(ImageGenerationRequest::new(prompt))
            .await?;

        let mut payload = ImagePayload::new(response.b64_json);
        if let Some(millis) = response.inference_millis {
            payload = payload.with_inference_millis(millis);
        }

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload.base64_payload())
            .map_err(|e| GenerationError::Malformed(format!("Image is not valid base64: {}", e)))?;
        if decoded.is_empty() {
            return Err(GenerationError::Malformed("Empty image".to_string()));
        }
        debug!("Generated {} byte image ({:?} ms)", decoded.len(), payload.inference_millis());

        let block = Block::image(payload).with_id(Uuid::new_v4().to_string());
        let index = self.orchestrator.append_block(page_index, block)?;
        Ok(GeneratedBlock {
            page: page_index,
            block: index,
        })
    }
}

/// Keep at most `max_words` whitespace-separated words
pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
