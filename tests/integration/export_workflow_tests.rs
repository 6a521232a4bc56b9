/*!
 * Export tests across all three backends
 */

use std::sync::Arc;

use storyforge::content::{Block, ImagePayload, Page};
use storyforge::errors::ExportError;
use storyforge::export::{layout, ExportFormat, ExportSettings, Exporter, IMAGE_PLACEHOLDER};
use storyforge::providers::mock::MockProvider;

use crate::common::{illustrated_pages, orchestrator_with, text_pages, RecordingPackager};

fn exporter_with(packager: Arc<RecordingPackager>) -> Exporter {
    Exporter::new(ExportSettings::default()).with_packager(packager)
}

#[tokio::test]
async fn test_export_withNoPages_shouldProduceArtifactInEveryFormat() {
    let exporter = exporter_with(Arc::new(RecordingPackager::default()));

    for format in ExportFormat::all() {
        let artifact = exporter.export(format, Vec::new(), "English").await.unwrap();
        assert!(!artifact.bytes.is_empty(), "{} artifact is empty", format);
        assert_eq!(artifact.mime_type, format.mime_type());
        assert_eq!(artifact.file_name(), format!("storybook_English.{}", format.extension()));
    }
}

#[tokio::test]
async fn test_export_pdf_shouldBeLoadableWithOnePagePerSheet() {
    let exporter = Exporter::default();

    let artifact = exporter
        .export(ExportFormat::FlowDocument, illustrated_pages(), "English")
        .await
        .unwrap();

    assert!(artifact.bytes.starts_with(b"%PDF"));
    let document = lopdf::Document::load_mem(&artifact.bytes).unwrap();
    let expected = layout(&illustrated_pages(), &ExportSettings::default()).page_count();
    assert_eq!(document.get_pages().len(), expected);
}

#[test]
fn test_layout_calledTwice_shouldBeIdentical() {
    let long_text = "word ".repeat(400);
    let pages = vec![
        Page::new(vec![Block::text(long_text.as_str()), Block::image(ImagePayload::new("AAAA"))]),
        Page::new(vec![Block::text("Short.")]),
    ];
    let settings = ExportSettings::default();

    let first = layout(&pages, &settings);
    let second = layout(&pages, &settings);

    assert_eq!(first, second);
    assert!(first.page_count() >= 2);
}

#[test]
fn test_layout_withBreakBetweenPages_shouldStartEachPageOnNewSheet() {
    let pages = text_pages(&[&["One."], &["Two."], &["Three."]]);

    let flowing = layout(&pages, &ExportSettings::default());
    let broken = layout(&pages, &ExportSettings { break_between_pages: true });

    assert_eq!(flowing.page_count(), 1);
    assert_eq!(broken.page_count(), 3);
}

#[tokio::test]
async fn test_export_translatedVariant_shouldUseTranslatedText() {
    let orchestrator = orchestrator_with(text_pages(&[&["<p>Hello &amp; welcome</p>"]]), &["French"], MockProvider::working());
    orchestrator.synchronize("English", &["French"]).await.unwrap();
    let packager = Arc::new(RecordingPackager::default());

    let pages = orchestrator.snapshot("French").unwrap();
    exporter_with(packager.clone())
        .export(ExportFormat::ReflowablePackage, pages, "French")
        .await
        .unwrap();

    let payloads = packager.payloads.lock();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["title"], "Storybook French");
    assert_eq!(payloads[0]["language"], "French");
    let text = payloads[0]["pages"][0]["blocks"][0]["content"].as_str().unwrap();
    assert!(text.starts_with("[French]"));
    assert!(!text.contains('<'));
}

#[tokio::test]
async fn test_export_epubWithWrongContainer_shouldFail() {
    let packager = Arc::new(RecordingPackager::returning(b"%PDF-1.5 not an epub".to_vec()));

    let result = exporter_with(packager)
        .export(ExportFormat::ReflowablePackage, text_pages(&[&["Hi."]]), "English")
        .await;

    assert!(matches!(result, Err(ExportError::InvalidArtifact(_))));
}

#[tokio::test]
async fn test_export_docxWithUndecodableImage_shouldStillSucceed() {
    let pages = vec![Page::new(vec![
        Block::image(ImagePayload::new("bm90IGFuIGltYWdl")),
        Block::text("Still here."),
    ])];

    let artifact = Exporter::default()
        .export(ExportFormat::StructuredPackage, pages.clone(), "English")
        .await
        .unwrap();
    let pdf = Exporter::default()
        .export(ExportFormat::FlowDocument, pages, "English")
        .await
        .unwrap();

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(artifact.bytes)).unwrap();
    let mut xml = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("word/document.xml").unwrap(), &mut xml).unwrap();
    assert!(xml.contains(IMAGE_PLACEHOLDER));
    assert!(xml.contains("Still here."));
    assert!(pdf.bytes.starts_with(b"%PDF"));
}
