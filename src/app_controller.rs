use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::{Config, ProviderKind};
use crate::content::{ContentStore, StoryDocument};
use crate::database::Repository;
use crate::errors::{AppError, ContentError};
use crate::export::{ExportFormat, Exporter, HttpPackager, ReflowablePackager};
use crate::file_utils::FileManager;
use crate::generation::{GeneratedBlock, StoryGenerator};
use crate::language_utils;
use crate::providers::ollama::Ollama;
use crate::providers::together::Together;
use crate::providers::{GenerationProvider, TranslationProvider};
use crate::translation::{BlockState, SyncReport, TranslationCache, TranslationOrchestrator};

// @module: Application controller for story files

/// What `continue` should append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Text,
    Image,
}

/// Main application controller: loads stories, runs the library and writes results
pub struct Controller {
    // @field: App configuration
    config: Config,
    translator: Arc<dyn TranslationProvider>,
    generator: Arc<dyn GenerationProvider>,
    packager: Option<Arc<dyn ReflowablePackager>>,
}

impl Controller {
    // @method: Create a controller whose collaborators come from the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let (translator, generator) = build_providers(&config);
        let packager: Option<Arc<dyn ReflowablePackager>> = if config.export.packager_endpoint.is_empty() {
            None
        } else {
            Some(Arc::new(HttpPackager::new(
                config.export.packager_endpoint.clone(),
                config.export.packager_timeout_secs,
            )))
        };

        Ok(Self {
            config,
            translator,
            generator,
            packager,
        })
    }

    /// Create a controller with explicit collaborators
    pub fn with_collaborators(
        config: Config,
        translator: Arc<dyn TranslationProvider>,
        generator: Arc<dyn GenerationProvider>,
        packager: Option<Arc<dyn ReflowablePackager>>,
    ) -> Self {
        Self {
            config,
            translator,
            generator,
            packager,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Synchronize the story at `story_path` into `targets` (the configured
    /// targets when empty) and write it back
    pub async fn translate(&self, story_path: &Path, targets: &[String]) -> Result<SyncReport> {
        let start_time = Instant::now();
        let targets = self.resolve_targets(targets)?;

        let cache = TranslationCache::new(self.config.sync.cache_capacity, self.config.sync.cache_enabled);
        let repository = self.open_repository()?;
        if let Some(repository) = &repository {
            repository.warm_cache(&cache).await?;
        }

        let orchestrator = self.load_orchestrator(story_path)?.with_cache(cache);
        let default_language = orchestrator.default_language();
        for target in &targets {
            if language_utils::languages_match(target, &default_language) {
                warn!("Skipping {}: it is the story's default language", target);
                continue;
            }
            if !orchestrator.languages().contains(target) {
                info!("Adding language {}", target);
                orchestrator.add_language(target)?;
            }
        }
        let targets: Vec<String> = targets
            .into_iter()
            .filter(|t| !language_utils::languages_match(t, &default_language))
            .collect();

        info!(
            "🚀 Storyforge: {} - {}",
            self.config.generation.provider.display_name(),
            self.config.generation.get_model()
        );

        let progress_bar = create_progress_bar(100, "Translating");
        let poller = {
            let orchestrator = orchestrator.clone();
            let progress_bar = progress_bar.clone();
            tokio::spawn(async move {
                loop {
                    progress_bar.set_position((orchestrator.progress() * 100.0).round() as u64);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            })
        };

        let result = orchestrator.synchronize(&default_language, targets.as_slice()).await;
        poller.abort();
        progress_bar.finish_and_clear();
        let report = result?;

        for failure in &report.failures {
            warn!(
                "{} page {} block {} was not translated: {}",
                failure.key.language, failure.key.page, failure.key.block, failure.error
            );
        }
        let stale = orchestrator.state_counts().get(&BlockState::Stale).copied().unwrap_or(0);
        if stale > 0 {
            warn!("{} block(s) are still out of date; run translate again to retry them", stale);
        }

        FileManager::write_story(story_path, &orchestrator.story_document())?;
        if let Some(repository) = &repository {
            orchestrator.prune_cache();
            repository.persist_cache(orchestrator.cache()).await?;
        }

        let stats = orchestrator.cache().stats();
        info!(
            "Applied {}/{} block(s), {} from cache ({:.0}% hit rate), {} call(s) in {}",
            report.applied,
            report.total_units,
            report.served_from_cache,
            stats.hit_rate() * 100.0,
            report.translation_calls,
            format_duration(start_time.elapsed())
        );

        Ok(report)
    }

    /// Export one language of the story into `output_dir`. Returns the written path.
    pub async fn export(&self, story_path: &Path, format: ExportFormat, language: &str, output_dir: &Path) -> Result<PathBuf> {
        let document = self.read_story(story_path)?;
        let store = ContentStore::from_document(document)?;
        let language = self.resolve_story_language(&store, language)?;
        let pages = store.snapshot(&language)?;

        let mut exporter = Exporter::new(self.config.export.settings());
        if let Some(packager) = &self.packager {
            exporter = exporter.with_packager(packager.clone());
        }

        let artifact = exporter.export(format, pages, &language).await?;
        let path = FileManager::write_artifact(output_dir, &artifact)?;
        info!("Success: {}", path.display());
        Ok(path)
    }

    /// Append generated text or an illustration to `page` and write the story back.
    /// An empty story gets an opening page first.
    pub async fn continue_story(
        &self,
        story_path: &Path,
        page: usize,
        prompt: &str,
        kind: Continuation,
    ) -> Result<GeneratedBlock> {
        let orchestrator = self.load_orchestrator(story_path)?;
        let generator = StoryGenerator::new(
            orchestrator.clone(),
            self.generator.clone(),
            self.config.generation.settings(),
        );
        if orchestrator.page_count() == 0 {
            generator.start_story();
        }

        let generated = match kind {
            Continuation::Text => generator.continue_story(page, prompt).await?,
            Continuation::Image => generator.generate_image(page, prompt).await?,
        };

        FileManager::write_story(story_path, &orchestrator.story_document())?;
        info!("Added block {} to page {}", generated.block, generated.page);
        Ok(generated)
    }

    fn read_story(&self, story_path: &Path) -> Result<StoryDocument> {
        if !FileManager::file_exists(story_path) {
            return Err(AppError::File(format!("Story file does not exist: {:?}", story_path)).into());
        }
        FileManager::read_story(story_path, &self.config.default_language)
    }

    fn load_orchestrator(&self, story_path: &Path) -> Result<TranslationOrchestrator> {
        let document = self.read_story(story_path)?;
        let store = ContentStore::from_document(document)
            .with_context(|| format!("Invalid story: {:?}", story_path))?;
        debug!(
            "Loaded {:?}: {} page(s), languages {:?}",
            story_path,
            store.page_count(),
            store.languages()
        );

        Ok(TranslationOrchestrator::new(store, self.translator.clone())
            .with_max_concurrent_requests(self.config.sync.max_concurrent_requests))
    }

    fn open_repository(&self) -> Result<Option<Repository>> {
        if !self.config.sync.persist_cache {
            return Ok(None);
        }
        Ok(Some(Repository::open(self.config.sync.cache_path.as_deref())?))
    }

    fn resolve_targets(&self, targets: &[String]) -> Result<Vec<String>> {
        let requested = if targets.is_empty() {
            &self.config.target_languages
        } else {
            targets
        };

        let mut resolved: Vec<String> = Vec::new();
        for tag in requested {
            let name = language_utils::resolve_language_name(tag)?;
            if !resolved.contains(&name) {
                resolved.push(name);
            }
        }
        Ok(resolved)
    }

    /// Match a user tag against the story's languages, accepting codes
    fn resolve_story_language(&self, store: &ContentStore, tag: &str) -> Result<String> {
        store
            .languages()
            .into_iter()
            .find(|language| language == tag || language_utils::languages_match(language, tag))
            .ok_or_else(|| {
                warn!("Story has no '{}' variant (available: {:?})", tag, store.languages());
                anyhow::Error::from(AppError::from(ContentError::UnknownLanguage(tag.to_string())))
            })
    }
}

/// Build the configured provider once and share it between both roles
fn build_providers(config: &Config) -> (Arc<dyn TranslationProvider>, Arc<dyn GenerationProvider>) {
    let generation = &config.generation;
    match generation.provider {
        ProviderKind::Ollama => {
            let provider = Arc::new(Ollama::new(
                generation.get_endpoint(),
                generation.get_model(),
                generation.get_timeout_secs(),
            ));
            (provider.clone() as Arc<dyn TranslationProvider>, provider as Arc<dyn GenerationProvider>)
        }
        ProviderKind::Together => {
            let provider = Arc::new(Together::new(
                generation.get_endpoint(),
                generation.get_api_key(),
                generation.get_model(),
                generation.get_timeout_secs(),
            ));
            (provider.clone() as Arc<dyn TranslationProvider>, provider as Arc<dyn GenerationProvider>)
        }
    }
}

fn create_progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let progress_bar = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {percent}% {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar.set_message(message);
    progress_bar
}

// Format duration in a human-readable format
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    }
}
