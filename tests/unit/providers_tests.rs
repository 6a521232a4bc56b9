/*!
 * Tests for the model service clients
 */

use storyforge::errors::ProviderError;
use storyforge::providers::mock::MockProvider;
use storyforge::providers::ollama::Ollama;
use storyforge::providers::together::Together;
use storyforge::providers::{
    GenerationProvider, ImageGenerationRequest, TextGenerationRequest, TranslationProvider, TranslationRequest,
};

/// Nothing listens on port 1
const UNREACHABLE: &str = "http://127.0.0.1:1";

fn continuation(prompt: &str) -> TextGenerationRequest {
    TextGenerationRequest {
        prompt: prompt.to_string(),
        story_prompt: "A lost kite".to_string(),
        prior_context: String::new(),
        language: "English".to_string(),
        max_words: 50,
        temperature: 0.7,
    }
}

#[test]
fn test_ollama_new_withBareHost_shouldAddSchemeAndPort() {
    let ollama = Ollama::new("localhost", "llama3.1", 5);
    assert_eq!(ollama.base_url(), "http://localhost:11434");
}

#[tokio::test]
async fn test_ollama_testConnection_withUnreachableServer_shouldReturnConnectionError() {
    let ollama = Ollama::new(UNREACHABLE, "llama3.1", 2);

    match ollama.test_connection().await {
        Err(ProviderError::ConnectionError(_)) => {}
        other => panic!("Unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_ollama_translate_withoutRetries_shouldFailFast() {
    let ollama = Ollama::new(UNREACHABLE, "llama3.1", 2).with_retries(0, 1);

    let result = ollama
        .translate(TranslationRequest::new("Hello", "English", "French"))
        .await;

    assert!(matches!(result, Err(ProviderError::ConnectionError(_))));
}

#[test]
fn test_ollama_generateImage_shouldBeUnsupported() {
    let ollama = Ollama::new(UNREACHABLE, "llama3.1", 2);

    let result = tokio_test::block_on(ollama.generate_image(ImageGenerationRequest::new("a kite")));

    assert!(matches!(result, Err(ProviderError::Unsupported(_))));
}

#[tokio::test]
async fn test_together_generateText_withUnreachableServer_shouldReturnConnectionError() {
    let together = Together::new(UNREACHABLE, "key", "some-model", 2);

    let result = together.generate_text(continuation("it flies away")).await;

    assert!(matches!(result, Err(ProviderError::ConnectionError(_))));
}

#[test]
fn test_mock_generateText_shouldFollowStoryPrompt() {
    let provider = MockProvider::working();

    let response = tokio_test::block_on(provider.generate_text(continuation("it flies away"))).unwrap();

    assert_eq!(response.text, "A lost kite And then it flies away.");
    assert_eq!(provider.calls(), 1);
}

// Requires a running Ollama server
#[ignore]
#[tokio::test]
async fn test_ollama_withRealServer_shouldTranslate() {
    let endpoint = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
    let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.1".to_string());
    let ollama = Ollama::new(endpoint, model, 60);

    let result = ollama.test_connection().await;
    assert!(result.is_ok(), "Connection test failed: {:?}", result.err());

    let response = ollama
        .translate(TranslationRequest::new("Good morning", "English", "French"))
        .await
        .unwrap();
    assert!(!response.translated_text.is_empty());
}
