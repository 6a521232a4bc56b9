/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use storyforge::app_config::{Config, LogLevel, ProviderConfig, ProviderKind};

use crate::common;

#[test]
fn test_providerKind_fromStr_shouldIgnoreCase() {
    assert_eq!("Ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
    assert_eq!("TOGETHER".parse::<ProviderKind>().unwrap(), ProviderKind::Together);
    assert!("openai".parse::<ProviderKind>().is_err());
    assert_eq!(ProviderKind::Together.to_string(), "together");
}

#[test]
fn test_logLevel_intoLevelFilter_shouldMatchVerbosity() {
    assert_eq!(log::LevelFilter::from(LogLevel::Error), log::LevelFilter::Error);
    assert_eq!(log::LevelFilter::from(LogLevel::Trace), log::LevelFilter::Trace);
    assert_eq!(LogLevel::default(), LogLevel::Info);
}

#[test]
fn test_save_thenLoad_shouldKeepOverrides() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("nested").join("conf.json");
    let mut config = Config::default();
    config.target_languages = vec!["Spanish".to_string(), "German".to_string()];
    config.generation.provider = ProviderKind::Together;
    config.generation.temperature = 1.2;
    config.export.break_between_pages = true;

    config.save(&path)?;
    let loaded = Config::load_or_create(&path)?;

    assert_eq!(loaded.target_languages, config.target_languages);
    assert_eq!(loaded.generation.provider, ProviderKind::Together);
    assert!(loaded.export.settings().break_between_pages);
    assert!((loaded.generation.settings().temperature - 1.2).abs() < f32::EPSILON);
    Ok(())
}

#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");
    std::fs::write(&path, "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

#[test]
fn test_validate_withBadPackagerEndpoint_shouldFail() {
    let mut config = Config::default();
    config.export.packager_endpoint = "not a url".to_string();
    assert!(config.validate().is_err());

    config.export.packager_endpoint = "http://localhost:8080/epub".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_withUnknownTargetLanguage_shouldFail() {
    let mut config = Config::default();
    config.target_languages = vec!["Elvish".to_string()];
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withOutOfRangeTemperature_shouldFail() {
    let mut config = Config::default();
    config.generation.temperature = 3.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_getApiKey_shouldReadActiveProviderEntry() {
    let mut config = Config::default();
    let mut together = ProviderConfig::new(ProviderKind::Together);
    together.api_key = "secret".to_string();
    together.model = "custom-model".to_string();
    config.generation.available_providers = vec![ProviderConfig::new(ProviderKind::Ollama), together];
    config.generation.provider = ProviderKind::Together;

    assert_eq!(config.generation.get_api_key(), "secret");
    assert_eq!(config.generation.get_model(), "custom-model");
    assert!(config.validate().is_ok());
}
