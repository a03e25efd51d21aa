use std::path::Path;

use crate::error::ExtractionError;
use crate::processor::{DocumentFormat, DocumentProcessor};

/// Reads plain-text documents as-is.
#[derive(Debug, Default)]
pub struct TextProcessor;

impl TextProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentProcessor for TextProcessor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!("processor.text").entered();

        std::fs::read_to_string(path).map_err(|e| ExtractionError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}
