/*!
 * Reflowable package (EPUB) backend.
 *
 * EPUB assembly is delegated to a packaging service. This module builds the
 * request payload, sends it through a `ReflowablePackager` and checks that
 * what comes back is an EPUB container.
 */

use std::fmt::Debug;
use std::io::{Cursor, Read};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde_json::{json, Value};

use crate::content::{Block, Page};
use crate::errors::{ExportError, ProviderError};
use crate::providers::status_error;

use super::document_title;
use super::sanitize::sanitize_text;

/// MIME type every EPUB container declares in its first entry
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// Packaging collaborator: JSON story in, EPUB bytes out
#[async_trait]
pub trait ReflowablePackager: Send + Sync + Debug {
    async fn package(&self, payload: &Value) -> Result<Vec<u8>, ProviderError>;
}

/// Packager that posts the payload to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpPackager {
    client: Client,
    endpoint: String,
}

impl HttpPackager {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1)))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReflowablePackager for HttpPackager {
    async fn package(&self, payload: &Value) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Packaging service error ({}): {}", status, message);
            return Err(status_error(status, message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Build the `{ pages, title, language }` request body. Text is sanitized;
/// media passes through.
pub fn build_payload(pages: &[Page], language: &str) -> Value {
    let pages: Vec<Value> = pages
        .iter()
        .map(|page| {
            let blocks: Vec<Value> = page
                .blocks
                .iter()
                .map(|block| match block {
                    Block::Text { content, .. } => json!({
                        "type": "text",
                        "content": sanitize_text(content),
                    }),
                    Block::Image { content, .. } => json!({
                        "type": "image",
                        "content": content.as_deref(),
                    }),
                    Block::Video { content, .. } => json!({
                        "type": "video",
                        "content": content,
                    }),
                })
                .collect();
            json!({ "blocks": blocks })
        })
        .collect();

    json!({
        "pages": pages,
        "title": document_title(language),
        "language": language,
    })
}

/// Check that `bytes` is a ZIP whose first entry is `mimetype` declaring EPUB
pub fn validate_epub(bytes: &[u8]) -> Result<(), ExportError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExportError::InvalidArtifact(format!("not a zip container: {}", e)))?;

    let mut first = archive
        .by_index(0)
        .map_err(|e| ExportError::InvalidArtifact(format!("empty container: {}", e)))?;
    if first.name() != "mimetype" {
        return Err(ExportError::InvalidArtifact(format!(
            "first entry is '{}', expected 'mimetype'",
            first.name()
        )));
    }

    let mut declared = String::new();
    first
        .read_to_string(&mut declared)
        .map_err(|e| ExportError::InvalidArtifact(e.to_string()))?;
    if declared.trim() != EPUB_MIMETYPE {
        return Err(ExportError::InvalidArtifact(format!(
            "mimetype is '{}'",
            declared.trim()
        )));
    }
    Ok(())
}

/// Package the pages through `packager` and validate the result
pub async fn render(packager: &dyn ReflowablePackager, pages: &[Page], language: &str) -> Result<Vec<u8>, ExportError> {
    let payload = build_payload(pages, language);
    debug!("Requesting EPUB package for '{}' ({} page(s))", language, pages.len());

    let bytes = packager.package(&payload).await?;
    validate_epub(&bytes)?;
    Ok(bytes)
}
