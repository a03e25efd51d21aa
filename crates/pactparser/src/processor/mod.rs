//! Text extraction collaborator.
//!
//! [`ProcessorRegistry`] routes a stored document to the processor for its
//! format and rejects documents that yield no text.

pub mod pdf;
pub mod text;

use std::path::Path;

use crate::error::ExtractionError;

/// Formats we can pull text out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" | "text" | "md" => Some(DocumentFormat::Text),
            _ => None,
        }
    }
}

/// Contract the orchestrator depends on: stored document in, text out.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError>;
}

pub trait DocumentProcessor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: vec![
                Box::new(pdf::PdfProcessor::new()),
                Box::new(text::TextProcessor::new()),
            ],
        }
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for ProcessorRegistry {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(extension.to_string()))?;

        let processor = self
            .processors
            .iter()
            .find(|p| p.supports(format))
            .ok_or_else(|| ExtractionError::UnsupportedFormat(extension.to_string()))?;

        let text = processor.extract(path)?;
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }

        tracing::debug!(chars = text.len(), ?format, "Extracted document text");
        Ok(text)
    }
}
