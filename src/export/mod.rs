/*!
 * Export of one language variant into a downloadable artifact.
 *
 * Three backends are available:
 * - `flow`: paginated PDF with a deterministic layout pass
 * - `structured`: DOCX word-processing package
 * - `reflowable`: EPUB built by an external packaging service
 *
 * Every backend works on an owned snapshot of the pages, so exports can run
 * while synchronization keeps editing the story.
 */

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine;
use image::{DynamicImage, ImageFormat};
use log::{debug, info};

use crate::content::{ImageMediaType, ImagePayload, Page};
use crate::errors::{ExportError, ProviderError};

pub mod flow;
pub mod reflowable;
pub mod sanitize;
pub mod structured;

pub use self::flow::{layout, FlowLayout, OutputPage, Placed};
pub use self::reflowable::{HttpPackager, ReflowablePackager};
pub use self::sanitize::sanitize_text;

/// Placeholder written where an image cannot be embedded
pub const IMAGE_PLACEHOLDER: &str = "Error: Unable to add image";

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Paginated document (PDF)
    FlowDocument,
    /// Word-processing package (DOCX)
    StructuredPackage,
    /// Reflowable e-book (EPUB)
    ReflowablePackage,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::FlowDocument => "pdf",
            Self::StructuredPackage => "docx",
            Self::ReflowablePackage => "epub",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::FlowDocument => "application/pdf",
            Self::StructuredPackage => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::ReflowablePackage => "application/epub+zip",
        }
    }

    pub fn all() -> [ExportFormat; 3] {
        [Self::FlowDocument, Self::StructuredPackage, Self::ReflowablePackage]
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" | "flow" => Ok(Self::FlowDocument),
            "docx" | "structured" => Ok(Self::StructuredPackage),
            "epub" | "reflowable" => Ok(Self::ReflowablePackage),
            other => Err(format!("Unsupported export format: {}", other)),
        }
    }
}

/// The bytes of an exported document
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
    pub language: String,
}

impl Artifact {
    pub fn new(format: ExportFormat, language: &str, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: format.mime_type().to_string(),
            extension: format.extension().to_string(),
            language: language.to_string(),
        }
    }

    /// `storybook_<language>.<ext>`
    pub fn file_name(&self) -> String {
        format!("storybook_{}.{}", self.language, self.extension)
    }
}

/// Options shared by the backends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSettings {
    /// Start every logical page on a new physical page in flow documents
    pub break_between_pages: bool,
}

/// Title used by every backend
pub fn document_title(language: &str) -> String {
    format!("Storybook {}", language)
}

/// Dispatches exports to the matching backend
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    packager: Option<Arc<dyn ReflowablePackager>>,
    settings: ExportSettings,
}

impl Exporter {
    pub fn new(settings: ExportSettings) -> Self {
        Self {
            packager: None,
            settings,
        }
    }

    /// Packaging collaborator for reflowable exports
    pub fn with_packager(mut self, packager: Arc<dyn ReflowablePackager>) -> Self {
        self.packager = Some(packager);
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Export `pages` of `language` as `format`
    pub async fn export(&self, format: ExportFormat, pages: Vec<Page>, language: &str) -> Result<Artifact, ExportError> {
        debug!("Exporting {} page(s) of '{}' as {}", pages.len(), language, format);

        let bytes = match format {
            ExportFormat::FlowDocument => {
                let settings = self.settings.clone();
                let title = document_title(language);
                tokio::task::spawn_blocking(move || flow::render(&pages, &settings, &title))
                    .await
                    .map_err(|e| ExportError::render("pdf", e))??
            }
            ExportFormat::StructuredPackage => {
                let language = language.to_string();
                tokio::task::spawn_blocking(move || structured::render(&pages, &language))
                    .await
                    .map_err(|e| ExportError::render("docx", e))??
            }
            ExportFormat::ReflowablePackage => {
                let packager = self.packager.as_ref().ok_or_else(|| {
                    ExportError::Collaborator(ProviderError::Unsupported(
                        "No packaging service configured".to_string(),
                    ))
                })?;
                reflowable::render(packager.as_ref(), &pages, language).await?
            }
        };

        info!("Exported '{}' as {} ({} bytes)", language, format, bytes.len());
        Ok(Artifact::new(format, language, bytes))
    }
}

/// Decode an image payload, trusting the declared type first
pub(crate) fn decode_image(payload: &ImagePayload) -> Result<DynamicImage, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.base64_payload().trim())
        .map_err(|e| format!("invalid base64: {}", e))?;

    let format = match payload.media_type() {
        ImageMediaType::Png => ImageFormat::Png,
        ImageMediaType::Jpeg => ImageFormat::Jpeg,
        ImageMediaType::Gif => ImageFormat::Gif,
        ImageMediaType::Bmp => ImageFormat::Bmp,
    };

    image::load_from_memory_with_format(&bytes, format)
        .or_else(|_| image::load_from_memory(&bytes))
        .map_err(|e| format!("undecodable image: {}", e))
}
