use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

use crate::export::ExportSettings;
use crate::generation::GenerationSettings;
use crate::language_utils;
use crate::translation::{DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_CONCURRENT_REQUESTS};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language every edit originates from
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Languages `translate` keeps in sync when none are given on the CLI
    #[serde(default = "default_target_languages")]
    pub target_languages: Vec<String>,

    /// Provider and continuation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Translation sync settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Model service type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    // @provider: Ollama (local)
    #[default]
    Ollama,
    // @provider: Together (hosted, OpenAI-compatible)
    Together,
}

impl ProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Together => "Together",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Together => "together",
        }
    }

    /// Whether requests must carry an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Together)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "together" => Ok(Self::Together),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param kind: Provider enum
    // @returns: Provider config with defaults
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            provider_type: kind.as_str().to_string(),
            model: default_model(kind),
            api_key: String::new(),
            endpoint: default_endpoint(kind),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Generation settings: which model service to use and how to continue stories
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Active provider, used for translation as well
    #[serde(default)]
    pub provider: ProviderKind,

    /// Configured providers
    #[serde(default = "default_available_providers")]
    pub available_providers: Vec<ProviderConfig>,

    /// Continuations are cut to this many words
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Prompt describing the story being written
    #[serde(default = "default_story_prompt")]
    pub story_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            available_providers: default_available_providers(),
            max_words: default_max_words(),
            temperature: default_temperature(),
            story_prompt: default_story_prompt(),
        }
    }
}

impl GenerationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.available_providers
            .iter()
            .find(|p| p.provider_type.eq_ignore_ascii_case(kind.as_str()))
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.model.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model(self.provider))
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.endpoint.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_endpoint(self.provider))
    }

    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|t| *t > 0)
            .unwrap_or_else(default_timeout_secs)
    }

    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            story_prompt: self.story_prompt.clone(),
            max_words: self.max_words,
            temperature: self.temperature,
        }
    }
}

/// Translation sync settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Keep the translation cache in a SQLite database between runs
    #[serde(default = "default_true")]
    pub persist_cache: bool,

    /// Database location, defaults to the user data directory
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            cache_capacity: default_cache_capacity(),
            cache_enabled: true,
            persist_cache: true,
            cache_path: None,
        }
    }
}

/// Export settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExportConfig {
    /// EPUB packaging service URL, EPUB export is unavailable when empty
    #[serde(default)]
    pub packager_endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub packager_timeout_secs: u64,

    /// Start every story page on a new PDF page
    #[serde(default)]
    pub break_between_pages: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            packager_endpoint: String::new(),
            packager_timeout_secs: default_timeout_secs(),
            break_between_pages: false,
        }
    }
}

impl ExportConfig {
    pub fn settings(&self) -> ExportSettings {
        ExportSettings {
            break_between_pages: self.break_between_pages,
        }
    }
}

/// Log level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_language() -> String {
    "English".to_string()
}

fn default_target_languages() -> Vec<String> {
    vec!["French".to_string()]
}

fn default_available_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(ProviderKind::Ollama),
        ProviderConfig::new(ProviderKind::Together),
    ]
}

fn default_model(kind: ProviderKind) -> String {
    match kind {
        ProviderKind::Ollama => "llama3.1".to_string(),
        ProviderKind::Together => "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo".to_string(),
    }
}

fn default_endpoint(kind: ProviderKind) -> String {
    match kind {
        ProviderKind::Ollama => "http://localhost:11434".to_string(),
        ProviderKind::Together => "https://api.together.xyz/v1".to_string(),
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_words() -> usize {
    200
}

fn default_temperature() -> f32 {
    0.7
}

fn default_story_prompt() -> String {
    "A short illustrated story for children.".to_string()
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load the configuration, writing a default file when none exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file not found at {}, creating a default one", path.display());
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let file = File::open(path).with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_reader(file).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        crate::file_utils::FileManager::write_to_file(path, &json)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        language_utils::resolve_language_name(&self.default_language)
            .context("Invalid default language")?;
        for language in &self.target_languages {
            language_utils::resolve_language_name(language)
                .with_context(|| format!("Invalid target language: {}", language))?;
            if language_utils::languages_match(language, &self.default_language) {
                return Err(anyhow!("Target language {} is the default language", language));
            }
        }

        if self.generation.max_words == 0 {
            return Err(anyhow!("generation.max_words must be positive"));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(anyhow!("generation.temperature must be between 0 and 2"));
        }
        if self.sync.max_concurrent_requests == 0 {
            return Err(anyhow!("sync.max_concurrent_requests must be positive"));
        }
        if self.sync.cache_capacity == 0 {
            return Err(anyhow!("sync.cache_capacity must be positive"));
        }

        if self.generation.provider.requires_api_key() && self.generation.get_api_key().is_empty() {
            return Err(anyhow!(
                "API key is required for {} provider",
                self.generation.provider.display_name()
            ));
        }

        Url::parse(&self.generation.get_endpoint())
            .with_context(|| format!("Invalid {} endpoint", self.generation.provider))?;
        if !self.export.packager_endpoint.is_empty() {
            Url::parse(&self.export.packager_endpoint).context("Invalid packager endpoint")?;
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            default_language: default_language(),
            target_languages: default_target_languages(),
            generation: GenerationConfig::default(),
            sync: SyncConfig::default(),
            export: ExportConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
