/*!
 * Canonical content tree for every language variant.
 *
 * The default variant is the only one users edit. Every structural change is
 * applied to it first and then mirrored to the derived variants, which keep
 * the same page count, block count and block kinds. Derived text is written
 * by the translation orchestrator or by an explicit manual override.
 */

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::ContentError;

use super::model::{Block, LanguageVariant, Page};

/// Where a block of a replaced page came from, relative to the previous page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOrigin {
    /// Same block as the previous page's block at this index
    Kept(usize),
    /// New block, derived variants received an empty placeholder
    Placeholder,
}

/// Outcome of `ContentStore::replace_page_content`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageReplacement {
    /// The default page was replaced and mirrored; one origin per new block
    Default { origins: Vec<BlockOrigin> },
    /// A derived page was overridden; block indices whose text changed
    Override { changed: Vec<usize> },
}

/// Serializable story file: the default language plus all variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryDocument {
    pub default_language: String,
    pub variants: Vec<LanguageVariant>,
}

/// Holds all language variants, default first
#[derive(Debug, Clone)]
pub struct ContentStore {
    variants: Vec<LanguageVariant>,
}

impl ContentStore {
    /// Create an empty story in the given default language
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            variants: vec![LanguageVariant::new(default_language)],
        }
    }

    /// Build a store from loaded variants.
    ///
    /// Derived variants must be congruent with the default one. Their media
    /// content is replaced by the default variant's shared payloads.
    pub fn from_variants(
        default_language: &str,
        variants: Vec<LanguageVariant>,
    ) -> Result<Self, ContentError> {
        let mut default = None;
        let mut derived = Vec::new();

        for variant in variants {
            if variant.language == default_language {
                if default.is_some() {
                    return Err(ContentError::DuplicateLanguage(variant.language));
                }
                default = Some(variant);
            } else {
                if derived.iter().any(|v: &LanguageVariant| v.language == variant.language) {
                    return Err(ContentError::DuplicateLanguage(variant.language));
                }
                derived.push(variant);
            }
        }

        let default = default.ok_or_else(|| ContentError::UnknownLanguage(default_language.to_string()))?;

        let mut store = Self {
            variants: vec![default],
        };

        for mut variant in derived {
            if variant.pages.len() != store.variants[0].pages.len() {
                return Err(ContentError::InvalidStory(format!(
                    "'{}' has {} pages, '{}' has {}",
                    variant.language,
                    variant.pages.len(),
                    default_language,
                    store.variants[0].pages.len()
                )));
            }

            for (page_index, (page, source)) in variant
                .pages
                .iter_mut()
                .zip(store.variants[0].pages.iter())
                .enumerate()
            {
                if page.shape() != source.shape() {
                    return Err(ContentError::InvalidStory(format!(
                        "'{}' page {} differs in block structure",
                        variant.language, page_index
                    )));
                }
                *page = merge_derived_page(source, page);
            }

            store.variants.push(variant);
        }

        Ok(store)
    }

    /// Load a story document
    pub fn from_document(document: StoryDocument) -> Result<Self, ContentError> {
        Self::from_variants(&document.default_language, document.variants)
    }

    /// Export the whole story as a serializable document
    pub fn to_document(&self) -> StoryDocument {
        StoryDocument {
            default_language: self.default_language().to_string(),
            variants: self.variants.clone(),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.variants[0].language
    }

    pub fn is_default(&self, language: &str) -> bool {
        self.default_language() == language
    }

    /// All language tags, default first
    pub fn languages(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.language.clone()).collect()
    }

    /// Derived language tags
    pub fn derived_languages(&self) -> Vec<String> {
        self.variants.iter().skip(1).map(|v| v.language.clone()).collect()
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.variants.iter().any(|v| v.language == language)
    }

    pub fn page_count(&self) -> usize {
        self.variants[0].pages.len()
    }

    pub fn variant(&self, language: &str) -> Option<&LanguageVariant> {
        self.variants.iter().find(|v| v.language == language)
    }

    /// Pages of the default variant
    pub fn default_pages(&self) -> &[Page] {
        &self.variants[0].pages
    }

    /// Owned copy of a variant's pages. Media payloads stay shared.
    pub fn snapshot(&self, language: &str) -> Result<Vec<Page>, ContentError> {
        self.variant(language)
            .map(|v| v.pages.clone())
            .ok_or_else(|| ContentError::UnknownLanguage(language.to_string()))
    }

    /// Text of a block in any variant
    pub fn text_at(&self, language: &str, page: usize, block: usize) -> Result<&str, ContentError> {
        let variant = self
            .variant(language)
            .ok_or_else(|| ContentError::UnknownLanguage(language.to_string()))?;
        let target = block_ref(&variant.pages, page, block)?;
        target.as_text().ok_or(ContentError::NotText { page, block })
    }

    /// Append a page to the default variant and mirror it. Returns its index.
    pub fn append_page(&mut self, page: Page) -> usize {
        let mirrored = page.mirrored();
        self.variants[0].pages.push(page);
        for variant in self.variants.iter_mut().skip(1) {
            variant.pages.push(mirrored.clone());
        }

        let index = self.page_count() - 1;
        debug!("Appended page {} across {} variant(s)", index, self.variants.len());
        index
    }

    /// Remove a page from every variant
    pub fn remove_page(&mut self, index: usize) -> Result<Page, ContentError> {
        let count = self.page_count();
        if index >= count {
            return Err(ContentError::PageOutOfRange { index, count });
        }

        for variant in self.variants.iter_mut().skip(1) {
            variant.pages.remove(index);
        }
        Ok(self.variants[0].pages.remove(index))
    }

    /// Append a block to a default page and mirror it. Returns the block index.
    pub fn append_block(&mut self, page: usize, block: Block) -> Result<usize, ContentError> {
        let count = self.page_count();
        if page >= count {
            return Err(ContentError::PageOutOfRange { index: page, count });
        }

        let mirrored = block.mirrored();
        self.variants[0].pages[page].blocks.push(block);
        for variant in self.variants.iter_mut().skip(1) {
            variant.pages[page].blocks.push(mirrored.clone());
        }
        Ok(self.variants[0].pages[page].blocks.len() - 1)
    }

    /// Replace the content of one page.
    ///
    /// On the default language the page is replaced and mirrored into every
    /// derived variant. Derived text survives for blocks that kept their
    /// identity (same id, or same position when ids are absent, and same
    /// kind); everything else gets an empty placeholder.
    ///
    /// On a derived language this is a manual override: the content must have
    /// the page's current shape and only text is taken from it.
    pub fn replace_page_content(
        &mut self,
        language: &str,
        page_index: usize,
        content: Page,
    ) -> Result<PageReplacement, ContentError> {
        let count = self.page_count();
        if page_index >= count {
            return Err(ContentError::PageOutOfRange { index: page_index, count });
        }

        if self.is_default(language) {
            let origins = match_origins(&self.variants[0].pages[page_index], &content);

            for variant in self.variants.iter_mut().skip(1) {
                let previous = &variant.pages[page_index];
                let blocks = content
                    .blocks
                    .iter()
                    .zip(origins.iter())
                    .map(|(source, origin)| match (source, origin) {
                        (Block::Text { id, .. }, BlockOrigin::Kept(j)) => Block::Text {
                            content: previous.blocks[*j].as_text().unwrap_or_default().to_string(),
                            id: id.clone(),
                            generating: false,
                        },
                        _ => source.mirrored(),
                    })
                    .collect();

                variant.pages[page_index] = Page {
                    blocks,
                    columns: content.columns,
                    background_image: content.background_image.clone(),
                };
            }

            self.variants[0].pages[page_index] = content;
            return Ok(PageReplacement::Default { origins });
        }

        let default_shape = self.variants[0].pages[page_index].shape();
        let variant = self
            .variants
            .iter_mut()
            .find(|v| v.language == language)
            .ok_or_else(|| ContentError::UnknownLanguage(language.to_string()))?;

        if content.shape() != default_shape {
            return Err(ContentError::Incongruent {
                language: language.to_string(),
                page: page_index,
            });
        }

        let mut changed = Vec::new();
        let page = &mut variant.pages[page_index];
        for (index, (current, incoming)) in page.blocks.iter_mut().zip(content.blocks).enumerate() {
            if let (Block::Text { content: old, .. }, Block::Text { content: new, .. }) = (current, incoming) {
                if *old != new {
                    *old = new;
                    changed.push(index);
                }
            }
        }

        debug!(
            "Manual override on '{}' page {}: {} block(s) changed",
            language,
            page_index,
            changed.len()
        );
        Ok(PageReplacement::Override { changed })
    }

    /// Add a derived language mirrored from the default variant with empty text
    pub fn add_language(&mut self, language: &str) -> Result<(), ContentError> {
        if self.has_language(language) {
            return Err(ContentError::DuplicateLanguage(language.to_string()));
        }

        let pages = self.variants[0].pages.iter().map(Page::mirrored).collect();
        self.variants.push(LanguageVariant {
            language: language.to_string(),
            pages,
        });
        Ok(())
    }

    /// Remove a derived language
    pub fn remove_language(&mut self, language: &str) -> Result<LanguageVariant, ContentError> {
        if self.is_default(language) {
            return Err(ContentError::CannotRemoveDefault(language.to_string()));
        }

        let position = self
            .variants
            .iter()
            .position(|v| v.language == language)
            .ok_or_else(|| ContentError::UnknownLanguage(language.to_string()))?;
        Ok(self.variants.remove(position))
    }

    /// Write translated text into a derived variant
    pub(crate) fn write_translation(
        &mut self,
        language: &str,
        page: usize,
        block: usize,
        text: &str,
    ) -> Result<(), ContentError> {
        if self.is_default(language) {
            return Err(ContentError::DefaultLanguageWrite(language.to_string()));
        }

        let variant = self
            .variants
            .iter_mut()
            .find(|v| v.language == language)
            .ok_or_else(|| ContentError::UnknownLanguage(language.to_string()))?;

        let count = variant.pages.len();
        let target_page = variant
            .pages
            .get_mut(page)
            .ok_or(ContentError::PageOutOfRange { index: page, count })?;
        let count = target_page.blocks.len();
        match target_page.blocks.get_mut(block) {
            Some(Block::Text { content, .. }) => {
                *content = text.to_string();
                Ok(())
            }
            Some(_) => Err(ContentError::NotText { page, block }),
            None => Err(ContentError::BlockOutOfRange { page, block, count }),
        }
    }

    /// Whether every derived variant has the default variant's shape
    pub fn is_congruent(&self) -> bool {
        let default = &self.variants[0].pages;
        self.variants.iter().skip(1).all(|variant| {
            variant.pages.len() == default.len()
                && variant
                    .pages
                    .iter()
                    .zip(default.iter())
                    .all(|(a, b)| a.shape() == b.shape())
        })
    }
}

/// Locate a block in a page list
fn block_ref(pages: &[Page], page: usize, block: usize) -> Result<&Block, ContentError> {
    let target = pages.get(page).ok_or(ContentError::PageOutOfRange {
        index: page,
        count: pages.len(),
    })?;
    target.blocks.get(block).ok_or(ContentError::BlockOutOfRange {
        page,
        block,
        count: target.blocks.len(),
    })
}

/// Match each new block to a previous block by id, or by position when
/// neither side carries an id
pub(crate) fn match_origins(previous: &Page, next: &Page) -> Vec<BlockOrigin> {
    next.blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            let found = match block.id() {
                Some(id) => previous.blocks.iter().position(|b| b.id() == Some(id)),
                None => previous
                    .blocks
                    .get(index)
                    .filter(|b| b.id().is_none())
                    .map(|_| index),
            };

            match found {
                Some(j) if previous.blocks[j].kind() == block.kind() => BlockOrigin::Kept(j),
                _ => BlockOrigin::Placeholder,
            }
        })
        .collect()
}

/// Derived page with its own text and the source page's media and layout
fn merge_derived_page(source: &Page, derived: &Page) -> Page {
    let blocks = source
        .blocks
        .iter()
        .zip(derived.blocks.iter())
        .map(|(src, own)| match (src, own) {
            (Block::Text { id, .. }, Block::Text { content, .. }) => Block::Text {
                content: content.clone(),
                id: id.clone(),
                generating: false,
            },
            _ => src.mirrored(),
        })
        .collect();

    Page {
        blocks,
        columns: source.columns,
        background_image: source.background_image.clone(),
    }
}
