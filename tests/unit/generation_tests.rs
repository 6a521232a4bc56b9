/*!
 * Tests for story generation on top of synchronization
 */

use std::sync::Arc;

use storyforge::content::{Block, BlockKind};
use storyforge::generation::{GenerationSettings, StoryGenerator};
use storyforge::providers::mock::MockProvider;
use storyforge::translation::BlockState;

use crate::common::{orchestrator_with, text_pages};

fn generator_over(pages: &[&[&str]], provider: MockProvider) -> StoryGenerator {
    let orchestrator = orchestrator_with(text_pages(pages), &["French"], provider.clone());
    StoryGenerator::new(
        orchestrator,
        Arc::new(provider),
        GenerationSettings {
            story_prompt: "A brave snail".to_string(),
            ..GenerationSettings::default()
        },
    )
}

#[tokio::test]
async fn test_continueStory_thenSynchronize_shouldTranslateNewBlock() {
    let generator = generator_over(&[&["The snail woke up."]], MockProvider::working());
    let orchestrator = generator.orchestrator().clone();
    orchestrator.synchronize("English", &["French"]).await.unwrap();

    let added = generator.continue_story(0, "it climbs a wall").await.unwrap();
    assert_eq!(orchestrator.block_state("French", 0, added.block), Some(BlockState::Stale));

    let report = orchestrator.synchronize("English", &["French"]).await.unwrap();

    assert_eq!(report.applied, 1);
    let english = orchestrator.text_at("English", 0, added.block).unwrap();
    assert_eq!(
        orchestrator.text_at("French", 0, added.block).unwrap(),
        MockProvider::expected_translation(&english, "French")
    );
}

#[tokio::test]
async fn test_priorContext_shouldOnlyIncludeEarlierPages() {
    let generator = generator_over(&[&["First."], &["Second."], &["Third."]], MockProvider::working());

    let context = generator.prior_context(1).unwrap();

    assert_eq!(context, "First.\nSecond.");
}

#[tokio::test]
async fn test_generateImage_withMissingPage_shouldNotCallProvider() {
    let provider = MockProvider::working();
    let generator = generator_over(&[&["Only page."]], provider.clone());
    let before = provider.calls();

    assert!(generator.generate_image(4, "a shell").await.is_err());
    assert_eq!(provider.calls(), before);
}

#[tokio::test]
async fn test_generateImage_withFailingProvider_shouldKeepPageShape() {
    let generator = generator_over(&[&["Only page."]], MockProvider::failing());

    assert!(generator.generate_image(0, "a shell").await.is_err());

    let french = generator.orchestrator().snapshot("French").unwrap();
    assert_eq!(french[0].shape(), vec![BlockKind::Text]);
}

#[tokio::test]
async fn test_startStory_shouldAppendEmptyTextPage() {
    let generator = generator_over(&[&["Existing."]], MockProvider::working());

    let page = generator.start_story();

    assert_eq!(page, 1);
    let english = generator.orchestrator().snapshot("English").unwrap();
    assert!(matches!(&english[1].blocks[0], Block::Text { content, .. } if content.is_empty()));
}
