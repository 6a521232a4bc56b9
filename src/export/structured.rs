/*!
 * Structured package (DOCX) backend built with `docx-rs`.
 *
 * The document opens with a centered title. Each logical page follows,
 * separated by page breaks. Images are embedded as floating pictures; an
 * image that cannot be decoded is replaced by a placeholder paragraph.
 */

use std::io::Cursor;

use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Pic, Run};
use image::ImageOutputFormat;
use log::warn;

use crate::content::{Block, ImagePayload, Page};
use crate::errors::ExportError;

use super::sanitize::sanitize_text;
use super::{decode_image, document_title, IMAGE_PLACEHOLDER};

/// Displayed picture size in pixels
pub const PICTURE_SIZE_PX: u32 = 100;
/// Offset of floating pictures in EMU
pub const PICTURE_OFFSET_EMU: i32 = 1_014_400;
const EMU_PER_PX: u32 = 9525;
/// Title size in half-points
const TITLE_SIZE: usize = 48;

/// Render the pages to DOCX bytes
pub fn render(pages: &[Page], language: &str) -> Result<Vec<u8>, ExportError> {
    let mut docx = Docx::new().add_paragraph(
        Paragraph::new()
            .add_run(Run::new().add_text(document_title(language)).bold().size(TITLE_SIZE))
            .align(AlignmentType::Center),
    );

    for (page_index, page) in pages.iter().enumerate() {
        if page_index > 0 {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
        }

        for (block_index, block) in page.blocks.iter().enumerate() {
            docx = match block {
                Block::Text { content, .. } => add_text(docx, content),
                Block::Image { content, .. } => match content.as_deref().map(picture) {
                    Some(Ok(pic)) => docx.add_paragraph(Paragraph::new().add_run(Run::new().add_image(pic))),
                    Some(Err(e)) => {
                        warn!("Image {}:{} {}, using placeholder", page_index, block_index, e);
                        docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(IMAGE_PLACEHOLDER)))
                    }
                    None => docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(IMAGE_PLACEHOLDER))),
                },
                Block::Video { content, .. } if !content.is_empty() => {
                    docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(content.clone())))
                }
                Block::Video { .. } => docx,
            };
        }
    }

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| ExportError::render("docx", e))?;
    Ok(buf.into_inner())
}

/// One paragraph per line of sanitized text
fn add_text(docx: Docx, content: &str) -> Docx {
    let text = sanitize_text(content);
    if text.is_empty() {
        return docx;
    }
    text.lines().fold(docx, |docx, line| {
        docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)))
    })
}

/// Decode, re-encode as PNG and wrap as a floating picture
fn picture(payload: &ImagePayload) -> Result<Pic, String> {
    let image = decode_image(payload)?;
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| format!("cannot re-encode image: {}", e))?;

    let size = PICTURE_SIZE_PX * EMU_PER_PX;
    Ok(Pic::new_with_dimensions(png, image.width(), image.height())
        .size(size, size)
        .floating()
        .offset_x(PICTURE_OFFSET_EMU)
        .offset_y(PICTURE_OFFSET_EMU))
}
