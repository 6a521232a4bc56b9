use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::content::{LanguageVariant, Page, StoryDocument};
use crate::export::Artifact;

// @module: Story file and directory utilities

/// Accepted story file layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum StoryFile {
    Document(StoryDocument),
    Pages(Vec<Page>),
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Find story files (`*.json`) below a directory
    pub fn find_story_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            let is_json = path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"));
            if path.is_file() && is_json {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        Self::write_atomically(path, content.as_bytes())
    }

    /// Load a story. A bare page list becomes the `fallback_language` variant.
    pub fn read_story<P: AsRef<Path>>(path: P, fallback_language: &str) -> Result<StoryDocument> {
        let path = path.as_ref();
        let content = Self::read_to_string(path)?;
        let story: StoryFile =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse story file: {:?}", path))?;

        Ok(match story {
            StoryFile::Document(document) => document,
            StoryFile::Pages(pages) => StoryDocument {
                default_language: fallback_language.to_string(),
                variants: vec![LanguageVariant {
                    language: fallback_language.to_string(),
                    pages,
                }],
            },
        })
    }

    /// Save a story as pretty JSON
    pub fn write_story<P: AsRef<Path>>(path: P, document: &StoryDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(document).context("Failed to serialize story")?;
        Self::write_atomically(path, json.as_bytes())
    }

    /// Write an exported artifact into `dir` under its canonical file name
    pub fn write_artifact<P: AsRef<Path>>(dir: P, artifact: &Artifact) -> Result<PathBuf> {
        let path = dir.as_ref().join(artifact.file_name());
        Self::write_atomically(&path, &artifact.bytes)?;
        Ok(path)
    }

    /// Write through a temp file in the target directory, then rename over the target
    fn write_atomically<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temp file in {:?}", parent))?;
        temp.write_all(bytes)
            .with_context(|| format!("Failed to write to file: {:?}", path))?;
        temp.persist(path)
            .map_err(|e| anyhow!("Failed to write to file {:?}: {}", path, e.error))?;
        Ok(())
    }
}
