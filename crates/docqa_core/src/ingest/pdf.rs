use std::path::Path;

use crate::error::AppError;

use super::{log_load_summary, source_id_for, DocumentLoader, LoadedDocument, PageText};

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<LoadedDocument, AppError> {
        let doc = lopdf::Document::load(path).map_err(|e| {
            AppError::new("INGEST_SOURCE_UNREADABLE", "Failed to open PDF document")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let mut pages = Vec::new();
        let mut skipped = 0u32;
        for page in page_numbers.iter().copied() {
            match doc.extract_text(&[page]) {
                Ok(text) if !text.trim().is_empty() => pages.push(PageText { page, text }),
                Ok(_) => skipped += 1,
                Err(e) => {
                    tracing::debug!(page, error = %e, "page text extraction failed");
                    skipped += 1;
                }
            }
        }

        let loaded = LoadedDocument {
            source_id: source_id_for(path),
            pages,
            pages_total: page_numbers.len() as u32,
            pages_skipped: skipped,
        };
        log_load_summary(&loaded);
        Ok(loaded)
    }
}
