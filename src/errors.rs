/*!
 * Error types for the storyforge application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider does not offer this capability
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Errors raised by structural operations on the content tree
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Language already present: {0}")]
    DuplicateLanguage(String),

    #[error("Page index {index} out of range (page count {count})")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Block {block} out of range on page {page} (block count {count})")]
    BlockOutOfRange { page: usize, block: usize, count: usize },

    /// Derived variants only accept edits that keep the page shape intact
    #[error("Content for '{language}' page {page} does not match the default page structure")]
    Incongruent { language: String, page: usize },

    #[error("The default language '{0}' cannot be removed")]
    CannotRemoveDefault(String),

    #[error("Translations cannot be written into the default language '{0}'")]
    DefaultLanguageWrite(String),

    #[error("Block at page {page}, position {block} is not a text block")]
    NotText { page: usize, block: usize },

    /// Loaded story variants disagree in shape
    #[error("Story variants are not congruent: {0}")]
    InvalidStory(String),
}

/// Run-level translation failures. Per-block failures are reported in the sync report.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the content tree
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Synchronization must read from the default language
    #[error("Synchronization source '{source_language}' is not the default language '{default_language}'")]
    SourceNotDefault {
        source_language: String,
        default_language: String,
    },
}

/// Errors from story generation
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The collaborator answered, but with nothing usable
    #[error("Malformed generation result: {0}")]
    Malformed(String),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),
}

/// Errors from the export backends
#[derive(Error, Debug)]
pub enum ExportError {
    /// Unrecoverable failure while laying out or serializing the artifact
    #[error("Failed to render {format}: {message}")]
    Render { format: String, message: String },

    /// The packaging collaborator failed
    #[error("Packaging service error: {0}")]
    Collaborator(#[from] ProviderError),

    /// The packaging collaborator returned something that is not a valid package
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),
}

impl ExportError {
    pub(crate) fn render(format: &str, message: impl std::fmt::Display) -> Self {
        Self::Render {
            format: format.to_string(),
            message: message.to_string(),
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the content tree
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from story generation
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Error from an export backend
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::File(format!("Invalid story file: {}", error))
    }
}
