/*!
 * Tests for the content store and its structural operations
 */

use storyforge::content::{Block, BlockKind, ContentStore, ImagePayload, LanguageVariant, Page, StoryDocument};
use storyforge::errors::ContentError;

use crate::common::{english_store, illustrated_pages, text_pages};

#[test]
fn test_appendPage_withDerivedLanguage_shouldMirrorShape() {
    let mut store = english_store(Vec::new());
    store.add_language("French").unwrap();

    store.append_page(illustrated_pages().remove(0));

    let french = store.snapshot("French").unwrap();
    assert_eq!(french[0].shape(), vec![BlockKind::Text, BlockKind::Image, BlockKind::Video]);
    assert_eq!(store.text_at("French", 0, 0).unwrap(), "");
    assert!(store.is_congruent());
}

#[test]
fn test_removeLanguage_withDefault_shouldFail() {
    let mut store = english_store(text_pages(&[&["Hi."]]));

    assert_eq!(
        store.remove_language("English").unwrap_err(),
        ContentError::CannotRemoveDefault("English".to_string())
    );
}

#[test]
fn test_addLanguage_twice_shouldFail() {
    let mut store = english_store(text_pages(&[&["Hi."]]));
    store.add_language("French").unwrap();

    assert!(matches!(store.add_language("French"), Err(ContentError::DuplicateLanguage(_))));
}

#[test]
fn test_replacePageContent_onDerivedWithWrongShape_shouldFail() {
    let mut store = english_store(text_pages(&[&["Hi."]]));
    store.add_language("French").unwrap();

    let result = store.replace_page_content("French", 0, Page::new(vec![Block::video("x")]));

    assert!(matches!(result, Err(ContentError::Incongruent { .. })));
}

#[test]
fn test_fromDocument_withIncongruentVariant_shouldFail() {
    let document = StoryDocument {
        default_language: "English".to_string(),
        variants: vec![
            LanguageVariant {
                language: "English".to_string(),
                pages: text_pages(&[&["One."], &["Two."]]),
            },
            LanguageVariant {
                language: "French".to_string(),
                pages: text_pages(&[&["Un."]]),
            },
        ],
    };

    assert!(matches!(
        ContentStore::from_document(document),
        Err(ContentError::InvalidStory(_))
    ));
}

#[test]
fn test_fromDocument_withMissingDefault_shouldFail() {
    let document = StoryDocument {
        default_language: "English".to_string(),
        variants: vec![LanguageVariant {
            language: "French".to_string(),
            pages: Vec::new(),
        }],
    };

    assert!(ContentStore::from_document(document).is_err());
}

#[test]
fn test_toDocument_thenFromDocument_shouldKeepTexts() {
    let mut store = english_store(vec![Page::new(vec![
        Block::text("Hello."),
        Block::image(ImagePayload::new("AAAA")),
    ])]);
    store.add_language("French").unwrap();

    let json = serde_json::to_string(&store.to_document()).unwrap();
    let reloaded = ContentStore::from_document(serde_json::from_str(&json).unwrap()).unwrap();

    assert_eq!(reloaded.languages(), vec!["English".to_string(), "French".to_string()]);
    assert_eq!(reloaded.text_at("English", 0, 0).unwrap(), "Hello.");
    assert_eq!(reloaded.snapshot("French").unwrap()[0].blocks[1].kind(), BlockKind::Image);
}

#[test]
fn test_removePage_outOfRange_shouldFail() {
    let mut store = english_store(text_pages(&[&["Only."]]));

    assert_eq!(
        store.remove_page(3).unwrap_err(),
        ContentError::PageOutOfRange { index: 3, count: 1 }
    );
}
