/*!
 * Story content types.
 *
 * A story is an ordered list of pages per language. Each page holds typed
 * blocks. The JSON shape matches what the story editor stores, so stories
 * can be loaded from and written back to disk unchanged.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Data URL prefix that may wrap an image payload
static DATA_URL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^data:image/(png|jpeg|jpg|gif|bmp);base64,").expect("valid data url regex")
});

/// Timing metadata reported by the image generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageTimings {
    /// Inference time in milliseconds
    pub inference: f64,
}

/// Generated image payload, shared by reference across language variants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImagePayload {
    /// Base64 image data, optionally wrapped in a `data:image/...;base64,` prefix
    pub b64_json: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<ImageTimings>,
}

/// Raster type of an embedded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMediaType {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageMediaType {
    /// File extension used inside document packages
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }
}

impl ImagePayload {
    pub fn new(b64_json: impl Into<String>) -> Self {
        Self {
            b64_json: b64_json.into(),
            timings: None,
        }
    }

    pub fn with_inference_millis(mut self, inference: f64) -> Self {
        self.timings = Some(ImageTimings { inference });
        self
    }

    /// The base64 data with any data URL prefix removed
    pub fn base64_payload(&self) -> &str {
        match DATA_URL_PREFIX.find(&self.b64_json) {
            Some(m) => &self.b64_json[m.end()..],
            None => &self.b64_json,
        }
    }

    /// Declared media type from the data URL prefix, PNG when there is none
    pub fn media_type(&self) -> ImageMediaType {
        let declared = DATA_URL_PREFIX
            .captures(&self.b64_json)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_lowercase());

        match declared.as_deref() {
            Some("jpeg") | Some("jpg") => ImageMediaType::Jpeg,
            Some("gif") => ImageMediaType::Gif,
            Some("bmp") => ImageMediaType::Bmp,
            _ => ImageMediaType::Png,
        }
    }

    pub fn inference_millis(&self) -> Option<f64> {
        self.timings.as_ref().map(|t| t.inference)
    }
}

/// Kind of a block, used for congruence checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Text,
    Image,
    Video,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// A single content unit within a page.
///
/// Layout keys written by the editor (`size`, `column`, `prompt`, ...) are
/// accepted and dropped. The `generating` flag is never written back and is
/// ignored by equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Text {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing)]
        generating: bool,
    },
    Image {
        #[serde(default)]
        content: Option<Arc<ImagePayload>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing)]
        generating: bool,
    },
    Video {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing)]
        generating: bool,
    },
}

impl Block {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            id: None,
            generating: false,
        }
    }

    pub fn image(payload: ImagePayload) -> Self {
        Self::Image {
            content: Some(Arc::new(payload)),
            id: None,
            generating: false,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self::Video {
            content: url.into(),
            id: None,
            generating: false,
        }
    }

    /// Attach a stable identifier
    pub fn with_id(mut self, new_id: impl Into<String>) -> Self {
        match &mut self {
            Self::Text { id, .. } | Self::Image { id, .. } | Self::Video { id, .. } => {
                *id = Some(new_id.into());
            }
        }
        self
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Text { .. } => BlockKind::Text,
            Self::Image { .. } => BlockKind::Image,
            Self::Video { .. } => BlockKind::Video,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Text { id, .. } | Self::Image { id, .. } | Self::Video { id, .. } => id.as_deref(),
        }
    }

    /// Text content, `None` for media blocks
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn is_generating(&self) -> bool {
        match self {
            Self::Text { generating, .. }
            | Self::Image { generating, .. }
            | Self::Video { generating, .. } => *generating,
        }
    }

    pub fn set_generating(&mut self, value: bool) {
        match self {
            Self::Text { generating, .. }
            | Self::Image { generating, .. }
            | Self::Video { generating, .. } => *generating = value,
        }
    }

    /// Structural copy for a derived language: same kind and id, empty text,
    /// media shared with `self`.
    pub fn mirrored(&self) -> Self {
        match self {
            Self::Text { id, .. } => Self::Text {
                content: String::new(),
                id: id.clone(),
                generating: false,
            },
            Self::Image { content, id, .. } => Self::Image {
                content: content.clone(),
                id: id.clone(),
                generating: false,
            },
            Self::Video { content, id, .. } => Self::Video {
                content: content.clone(),
                id: id.clone(),
                generating: false,
            },
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Text { content: a, id: ia, .. },
                Self::Text { content: b, id: ib, .. },
            ) => a == b && ia == ib,
            (
                Self::Image { content: a, id: ia, .. },
                Self::Image { content: b, id: ib, .. },
            ) => a == b && ia == ib,
            (
                Self::Video { content: a, id: ia, .. },
                Self::Video { content: b, id: ib, .. },
            ) => a == b && ia == ib,
            _ => false,
        }
    }
}

/// An ordered sequence of blocks with optional layout metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Page {
    #[serde(default)]
    pub blocks: Vec<Block>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,

    #[serde(
        default,
        rename = "backgroundImage",
        skip_serializing_if = "Option::is_none"
    )]
    pub background_image: Option<String>,
}

impl Page {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            columns: None,
            background_image: None,
        }
    }

    /// Block kinds in order
    pub fn shape(&self) -> Vec<BlockKind> {
        self.blocks.iter().map(Block::kind).collect()
    }

    /// Same layout and shape, empty text, shared media
    pub fn mirrored(&self) -> Self {
        Self {
            blocks: self.blocks.iter().map(Block::mirrored).collect(),
            columns: self.columns,
            background_image: self.background_image.clone(),
        }
    }

    /// All text of the page in block order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(Block::as_text)
    }
}

/// One language's full page sequence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageVariant {
    pub language: String,

    #[serde(default)]
    pub pages: Vec<Page>,
}

impl LanguageVariant {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            pages: Vec::new(),
        }
    }
}
