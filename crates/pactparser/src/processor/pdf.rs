use std::path::Path;

use lopdf::{dictionary, Document, Object, Stream};

use crate::error::ExtractionError;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// Inserted between the text of consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n--- END OF PAGE ---\n\n";

/// Extracts embedded text from PDFs with lopdf. Scanned documents without a
/// text layer come out empty and are rejected by the registry.
#[derive(Debug, Default)]
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentProcessor for PdfProcessor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let bytes = std::fs::read(path).map_err(|e| ExtractionError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = Document::load_mem(&bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;
        Ok(extract_pages(&doc))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

/// Page texts in page order, joined by [`PAGE_SEPARATOR`]. Pages whose text
/// cannot be decoded are skipped.
fn extract_pages(doc: &Document) -> String {
    let mut pages = Vec::new();

    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(text) if !text.trim().is_empty() => pages.push(text.trim().to_string()),
            Ok(_) => {}
            Err(e) => tracing::warn!(page = page_num, "Skipping undecodable PDF page: {}", e),
        }
    }

    pages.join(PAGE_SEPARATOR)
}

/// Renders lines of plain text into a minimal PDF, one entry of `pages` per
/// page. Used to produce fixture documents.
pub fn render_text_pdf(pages: &[&str]) -> Result<Vec<u8>, ExtractionError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page_text in pages {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            page_content(page_text).into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    Ok(buffer)
}

fn page_content(text: &str) -> String {
    let mut content = String::from("BT\n/F1 10 Tf\n50 742 Td\n12 TL\n");
    for line in text.lines().take(60) {
        content.push_str(&format!("({}) Tj T*\n", escape_pdf_string(line)));
    }
    content.push_str("ET\n");
    content
}

fn escape_pdf_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_ascii() && !c.is_control() => escaped.push(c),
            _ => escaped.push(' '),
        }
    }
    escaped
}
