/*!
 * Common test utilities for the storyforge test suite
 */

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use storyforge::app_config::Config;
use storyforge::content::{Block, ContentStore, ImagePayload, Page, StoryDocument};
use storyforge::errors::ProviderError;
use storyforge::export::reflowable::{ReflowablePackager, EPUB_MIMETYPE};
use storyforge::file_utils::FileManager;
use storyforge::providers::mock::{MockProvider, MOCK_PNG_BASE64};
use storyforge::providers::{TranslationProvider, TranslationRequest, TranslationResponse};
use storyforge::translation::TranslationOrchestrator;

/// Route library logs through env_logger when RUST_LOG is set
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// One page per entry, one text block per string
pub fn text_pages(pages: &[&[&str]]) -> Vec<Page> {
    pages
        .iter()
        .map(|texts| Page::new(texts.iter().map(|t| Block::text(*t)).collect()))
        .collect()
}

/// An English story with the given pages
pub fn english_store(pages: Vec<Page>) -> ContentStore {
    let mut store = ContentStore::new("English");
    for page in pages {
        store.append_page(page);
    }
    store
}

/// An English story with `languages` added, synchronized by `provider`
pub fn orchestrator_with(pages: Vec<Page>, languages: &[&str], provider: MockProvider) -> TranslationOrchestrator {
    let orchestrator = TranslationOrchestrator::new(english_store(pages), Arc::new(provider));
    for language in languages {
        orchestrator.add_language(language).expect("language should be new");
    }
    orchestrator
}

/// Text, image and video on one page, plus a second text page
pub fn illustrated_pages() -> Vec<Page> {
    vec![
        Page::new(vec![
            Block::text("<p>Once upon a time.</p>"),
            Block::image(ImagePayload::new(MOCK_PNG_BASE64)),
            Block::video("https://example.com/fox.mp4"),
        ]),
        Page::new(vec![Block::text("The fox found a key.")]),
    ]
}

/// Write a story document into `dir`
pub fn write_story(dir: &Path, name: &str, document: &StoryDocument) -> Result<PathBuf> {
    let path = dir.join(name);
    FileManager::write_story(&path, document)?;
    Ok(path)
}

/// Default config with a config-independent default language
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.default_language = "English".to_string();
    config.target_languages = vec!["French".to_string()];
    config.sync.persist_cache = false;
    config
}

/// Translator that records how many requests were in flight at once
#[derive(Debug, Default)]
pub struct PeakProvider {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    delay_ms: u64,
}

impl PeakProvider {
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    /// Highest number of concurrent requests seen so far
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for PeakProvider {
    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResponse, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(TranslationResponse {
            translated_text: MockProvider::expected_translation(&request.source_text, &request.target_language),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Minimal EPUB container: a stored `mimetype` entry first
pub fn minimal_epub(title: &str) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored).expect("start mimetype");
    zip.write_all(EPUB_MIMETYPE.as_bytes()).expect("write mimetype");
    zip.start_file("OEBPS/content.opf", FileOptions::default())
        .expect("start opf");
    zip.write_all(format!("<package><metadata><title>{}</title></metadata></package>", title).as_bytes())
        .expect("write opf");
    zip.finish().expect("finish zip").into_inner()
}

/// Packaging service stand-in recording every payload it receives
#[derive(Debug, Default)]
pub struct RecordingPackager {
    pub payloads: Mutex<Vec<Value>>,
    /// Return this instead of a valid container
    pub response: Option<Vec<u8>>,
}

impl RecordingPackager {
    pub fn returning(bytes: Vec<u8>) -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            response: Some(bytes),
        }
    }
}

#[async_trait]
impl ReflowablePackager for RecordingPackager {
    async fn package(&self, payload: &Value) -> Result<Vec<u8>, ProviderError> {
        self.payloads.lock().push(payload.clone());
        match &self.response {
            Some(bytes) => Ok(bytes.clone()),
            None => Ok(minimal_epub(payload["title"].as_str().unwrap_or_default())),
        }
    }
}
