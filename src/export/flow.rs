/*!
 * Flow document (PDF) backend.
 *
 * Rendering happens in two passes. `layout` turns the pages into positioned
 * items on A4 sheets using fixed geometry in millimetres; it is pure and
 * deterministic. `render` draws that layout with `lopdf`, decoding images
 * on the way. Pagination is independent of logical pages unless
 * `break_between_pages` is set.
 */

use std::collections::BTreeMap;

use log::warn;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::content::{Block, Page};
use crate::errors::ExportError;

use super::sanitize::sanitize_text;
use super::{decode_image, ExportSettings, IMAGE_PLACEHOLDER};

/// A4 width in mm
pub const PAGE_WIDTH_MM: f32 = 210.0;
/// A4 height in mm
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_LEFT_MM: f32 = 20.0;
pub const MARGIN_TOP_MM: f32 = 20.0;
/// Width of the text column
pub const TEXT_WIDTH_MM: f32 = 170.0;
pub const LINE_HEIGHT_MM: f32 = 7.0;
/// Characters per line at 12 pt in the text column
pub const WRAP_COLUMNS: usize = 80;
pub const FONT_SIZE_PT: i64 = 12;
pub const IMAGE_WIDTH_MM: f32 = 170.0;
pub const IMAGE_HEIGHT_MM: f32 = 100.0;
/// Vertical advance after an image
pub const IMAGE_ADVANCE_MM: f32 = 110.0;
/// A new sheet starts once the cursor passes this line
pub const BREAK_AT_MM: f32 = 280.0;

const MM_TO_PT: f32 = 72.0 / 25.4;

/// One positioned item; coordinates are mm from the top-left corner
#[derive(Debug, Clone, PartialEq)]
pub enum Placed {
    Line { x: f32, y: f32, text: String },
    /// Image of logical `page`, `block`
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        page: usize,
        block: usize,
    },
}

/// One physical sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputPage {
    pub items: Vec<Placed>,
}

/// The full paginated layout
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLayout {
    pub pages: Vec<OutputPage>,
}

impl FlowLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

struct Cursor {
    pages: Vec<OutputPage>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![OutputPage::default()],
            y: MARGIN_TOP_MM,
        }
    }

    fn new_sheet(&mut self) {
        self.pages.push(OutputPage::default());
        self.y = MARGIN_TOP_MM;
    }

    fn current_is_empty(&self) -> bool {
        self.pages.last().is_none_or(|p| p.items.is_empty())
    }

    fn ensure_room(&mut self, height: f32) {
        if self.current_is_empty() {
            return;
        }
        if self.y > BREAK_AT_MM || self.y + height > PAGE_HEIGHT_MM - 10.0 {
            self.new_sheet();
        }
    }

    fn place(&mut self, item: Placed) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    fn line(&mut self, text: String) {
        self.ensure_room(LINE_HEIGHT_MM);
        self.place(Placed::Line {
            x: MARGIN_LEFT_MM,
            y: self.y,
            text,
        });
        self.y += LINE_HEIGHT_MM;
    }
}

/// Lay the pages out on A4 sheets. Always yields at least one sheet.
pub fn layout(pages: &[Page], settings: &ExportSettings) -> FlowLayout {
    let mut cursor = Cursor::new();

    for (page_index, page) in pages.iter().enumerate() {
        if settings.break_between_pages && page_index > 0 && !cursor.current_is_empty() {
            cursor.new_sheet();
        }

        for (block_index, block) in page.blocks.iter().enumerate() {
            match block {
                Block::Text { content, .. } => {
                    let text = sanitize_text(content);
                    if text.is_empty() {
                        continue;
                    }
                    for line in wrap_text(&text, WRAP_COLUMNS) {
                        cursor.line(line);
                    }
                }
                // Still generating
                Block::Image { content: None, .. } => continue,
                Block::Image { .. } => {
                    cursor.ensure_room(IMAGE_HEIGHT_MM);
                    cursor.place(Placed::Image {
                        x: MARGIN_LEFT_MM,
                        y: cursor.y,
                        width: IMAGE_WIDTH_MM,
                        height: IMAGE_HEIGHT_MM,
                        page: page_index,
                        block: block_index,
                    });
                    cursor.y += IMAGE_ADVANCE_MM;
                }
                Block::Video { content, .. } => {
                    if !content.is_empty() {
                        for line in wrap_text(&format!("Video: {}", content), WRAP_COLUMNS) {
                            cursor.line(line);
                        }
                    }
                }
            }
        }
    }

    FlowLayout { pages: cursor.pages }
}

/// Greedy word wrap at `columns` characters. Blank input lines are kept.
pub fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut width = 0;

        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            let mut word_width = word.chars().count();

            while word_width > columns {
                if width > 0 {
                    lines.push(std::mem::take(&mut current));
                    width = 0;
                }
                let head: String = word.chars().take(columns).collect();
                word = word.chars().skip(columns).collect();
                word_width -= columns;
                lines.push(head);
            }

            if width > 0 && width + 1 + word_width > columns {
                lines.push(std::mem::take(&mut current));
                width = 0;
            }
            if width > 0 {
                current.push(' ');
                width += 1;
            }
            current.push_str(&word);
            width += word_width;
        }

        lines.push(current);
    }

    lines
}

/// Encode text for the WinAnsi Helvetica font; unsupported characters become `?`
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            'œ' => 0x9c,
            'Œ' => 0x8c,
            '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

fn pt(mm: f32) -> i64 {
    (mm * MM_TO_PT).round() as i64
}

fn num(value: i64) -> Object {
    Object::Integer(value)
}

/// Render the pages to PDF bytes
pub fn render(pages: &[Page], settings: &ExportSettings, title: &str) -> Result<Vec<u8>, ExportError> {
    let plan = layout(pages, settings);
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    // Decode each referenced image once
    let mut images: BTreeMap<(usize, usize), Option<ObjectId>> = BTreeMap::new();
    let mut xobjects = Dictionary::new();
    for item in plan.pages.iter().flat_map(|p| p.items.iter()) {
        if let Placed::Image { page, block, .. } = item {
            let key = (*page, *block);
            if images.contains_key(&key) {
                continue;
            }
            let id = embed_image(&mut doc, pages, key);
            if let Some(id) = id {
                xobjects.set(image_name(key), Object::Reference(id));
            }
            images.insert(key, id);
        }
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => xobjects,
    });

    let page_height = pt(PAGE_HEIGHT_MM);
    let mut kids = Vec::with_capacity(plan.pages.len());

    for sheet in &plan.pages {
        let mut operations = Vec::new();
        for item in &sheet.items {
            match item {
                Placed::Line { x, y, text } => text_operations(&mut operations, *x, *y, text, page_height),
                Placed::Image {
                    x,
                    y,
                    width,
                    height,
                    page,
                    block,
                } => match images.get(&(*page, *block)).copied().flatten() {
                    Some(_) => {
                        operations.push(Operation::new("q", vec![]));
                        operations.push(Operation::new(
                            "cm",
                            vec![
                                num(pt(*width)),
                                num(0),
                                num(0),
                                num(pt(*height)),
                                num(pt(*x)),
                                num(page_height - pt(*y + *height)),
                            ],
                        ));
                        operations.push(Operation::new(
                            "Do",
                            vec![Object::Name(image_name((*page, *block)).into_bytes())],
                        ));
                        operations.push(Operation::new("Q", vec![]));
                    }
                    None => text_operations(&mut operations, *x, *y, IMAGE_PLACEHOLDER, page_height),
                },
            }
        }

        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| ExportError::render("pdf", e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![num(0), num(0), num(pt(PAGE_WIDTH_MM)), num(page_height)],
        }),
    );

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(to_win_ansi(title)),
        "Producer" => Object::string_literal("storyforge"),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ExportError::render("pdf", e))?;
    Ok(bytes)
}

fn text_operations(operations: &mut Vec<Operation>, x: f32, y: f32, text: &str, page_height: i64) {
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new("Tf", vec!["F1".into(), num(FONT_SIZE_PT)]));
    operations.push(Operation::new("Td", vec![num(pt(x)), num(page_height - pt(y))]));
    operations.push(Operation::new("Tj", vec![Object::string_literal(to_win_ansi(text))]));
    operations.push(Operation::new("ET", vec![]));
}

fn image_name((page, block): (usize, usize)) -> String {
    format!("Im{}_{}", page, block)
}

/// Add the image at `key` as an RGB XObject; `None` if it cannot be decoded
fn embed_image(doc: &mut Document, pages: &[Page], key: (usize, usize)) -> Option<ObjectId> {
    let payload = match pages.get(key.0).and_then(|p| p.blocks.get(key.1)) {
        Some(Block::Image { content: Some(payload), .. }) => payload,
        _ => {
            warn!("Image {}:{} has no content, using placeholder", key.0, key.1);
            return None;
        }
    };

    match decode_image(payload) {
        Ok(image) => {
            let rgb = image.to_rgb8();
            let (width, height) = rgb.dimensions();
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => num(width as i64),
                    "Height" => num(height as i64),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => num(8),
                },
                rgb.into_raw(),
            );
            Some(doc.add_object(stream))
        }
        Err(e) => {
            warn!("Image {}:{} {}, using placeholder", key.0, key.1, e);
            None
        }
    }
}
