/*!
 * Full story-file workflows through the application controller
 */

use std::sync::Arc;

use storyforge::app_controller::{Continuation, Controller};
use storyforge::content::{LanguageVariant, StoryDocument};
use storyforge::errors::{AppError, ContentError};
use storyforge::export::ExportFormat;
use storyforge::file_utils::FileManager;
use storyforge::providers::mock::MockProvider;

use crate::common::{create_temp_dir, test_config, text_pages, write_story, RecordingPackager};

fn english_document(pages: &[&[&str]]) -> StoryDocument {
    StoryDocument {
        default_language: "English".to_string(),
        variants: vec![LanguageVariant {
            language: "English".to_string(),
            pages: text_pages(pages),
        }],
    }
}

fn controller(provider: MockProvider) -> Controller {
    let provider = Arc::new(provider);
    Controller::with_collaborators(
        test_config(),
        provider.clone(),
        provider,
        Some(Arc::new(RecordingPackager::default())),
    )
}

#[tokio::test]
async fn test_translate_shouldAddTargetAndWriteStoryBack() {
    let dir = create_temp_dir().unwrap();
    let path = write_story(dir.path(), "story.json", &english_document(&[&["Once upon a time."]])).unwrap();

    let report = controller(MockProvider::working())
        .translate(&path, &["fr".to_string()])
        .await
        .unwrap();

    assert!(report.is_complete());
    let saved = FileManager::read_story(&path, "German").unwrap();
    assert_eq!(saved.default_language, "English");
    let french = saved.variants.iter().find(|v| v.language == "French").unwrap();
    assert_eq!(
        french.pages[0].blocks[0].as_text(),
        Some(MockProvider::expected_translation("Once upon a time.", "French").as_str())
    );
}

#[tokio::test]
async fn test_translate_withBarePageList_shouldUseConfiguredDefaultLanguage() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("pages.json");
    std::fs::write(&path, r#"[{"blocks":[{"type":"text","content":"Hello."}]}]"#).unwrap();

    controller(MockProvider::working()).translate(&path, &[]).await.unwrap();

    let saved = FileManager::read_story(&path, "English").unwrap();
    let languages: Vec<&str> = saved.variants.iter().map(|v| v.language.as_str()).collect();
    assert_eq!(languages, vec!["English", "French"]);
}

#[tokio::test]
async fn test_translate_withFailingProvider_shouldReportIncompleteRun() {
    let dir = create_temp_dir().unwrap();
    let path = write_story(dir.path(), "story.json", &english_document(&[&["A.", "B."]])).unwrap();

    let report = controller(MockProvider::failing())
        .translate(&path, &["French".to_string()])
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 2);
}

#[tokio::test]
async fn test_translate_withUnknownLanguage_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = write_story(dir.path(), "story.json", &english_document(&[&["A."]])).unwrap();

    let result = controller(MockProvider::working())
        .translate(&path, &["Klingonese".to_string()])
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_translate_withPersistedCache_shouldSkipCallsOnSecondStory() {
    let dir = create_temp_dir().unwrap();
    let mut config = test_config();
    config.sync.persist_cache = true;
    config.sync.cache_path = Some(dir.path().join("cache.db"));
    let provider = MockProvider::working();
    let shared = Arc::new(provider.clone());
    let controller = Controller::with_collaborators(config, shared.clone(), shared, None);

    let first = write_story(dir.path(), "first.json", &english_document(&[&["Shared line."]])).unwrap();
    let second = write_story(dir.path(), "second.json", &english_document(&[&["Shared line."]])).unwrap();

    controller.translate(&first, &[]).await.unwrap();
    let report = controller.translate(&second, &[]).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(report.served_from_cache, 1);
}

#[tokio::test]
async fn test_export_shouldWriteCanonicalFileName() {
    let dir = create_temp_dir().unwrap();
    let path = write_story(dir.path(), "story.json", &english_document(&[&["Hello."]])).unwrap();
    let controller = controller(MockProvider::working());
    controller.translate(&path, &[]).await.unwrap();

    for format in ExportFormat::all() {
        let written = controller.export(&path, format, "fr", dir.path()).await.unwrap();
        assert_eq!(
            written.file_name().unwrap().to_string_lossy(),
            format!("storybook_French.{}", format.extension())
        );
        assert!(std::fs::metadata(&written).unwrap().len() > 0);
    }
}

#[tokio::test]
async fn test_export_withMissingLanguage_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = write_story(dir.path(), "story.json", &english_document(&[&["Hello."]])).unwrap();

    let result = controller(MockProvider::working())
        .export(&path, ExportFormat::FlowDocument, "German", dir.path())
        .await;

    let error = result.unwrap_err();
    assert!(matches!(
        error.downcast_ref::<AppError>(),
        Some(AppError::Content(ContentError::UnknownLanguage(tag))) if tag == "German"
    ));
}

#[tokio::test]
async fn test_translate_withMissingStoryFile_shouldReportFileError() {
    let dir = create_temp_dir().unwrap();

    let result = controller(MockProvider::working())
        .translate(&dir.path().join("missing.json"), &[])
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error.downcast_ref::<AppError>(), Some(AppError::File(_))));
}

#[tokio::test]
async fn test_continueStory_onEmptyStory_shouldCreateOpeningPage() {
    let dir = create_temp_dir().unwrap();
    let path = write_story(dir.path(), "story.json", &english_document(&[])).unwrap();
    let controller = controller(MockProvider::working());

    let text = controller
        .continue_story(&path, 0, "a fox finds a key", Continuation::Text)
        .await
        .unwrap();
    let image = controller
        .continue_story(&path, 0, "the key glows", Continuation::Image)
        .await
        .unwrap();

    assert_eq!((text.page, text.block), (0, 1));
    assert_eq!((image.page, image.block), (0, 2));
    let saved = FileManager::read_story(&path, "English").unwrap();
    assert_eq!(saved.variants[0].pages[0].blocks.len(), 3);
    assert!(saved.variants[0].pages[0].blocks[1].as_text().unwrap().contains("a fox finds a key"));
}
