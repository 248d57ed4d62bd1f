use std::fs;
use std::path::Path;

use crate::error::AppError;

use super::{log_load_summary, source_id_for, DocumentLoader, LoadedDocument, PageText};

/// Plain-text loader. Form feeds (`\x0c`) separate pages, as `pdftotext` emits them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<LoadedDocument, AppError> {
        let bytes = fs::read(path).map_err(|e| {
            AppError::new("INGEST_SOURCE_UNREADABLE", "Failed to read source document")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let raw = String::from_utf8_lossy(&bytes);
        let loaded = split_pages(&source_id_for(path), &raw);
        log_load_summary(&loaded);
        Ok(loaded)
    }
}

pub fn split_pages(source_id: &str, raw: &str) -> LoadedDocument {
    let normalized = raw.replace("\r\n", "\n");
    let mut pages = Vec::new();
    let mut total = 0u32;
    let mut skipped = 0u32;
    for (i, text) in normalized.split('\x0c').enumerate() {
        total += 1;
        if text.trim().is_empty() {
            skipped += 1;
            continue;
        }
        pages.push(PageText {
            page: i as u32 + 1,
            text: text.to_string(),
        });
    }
    // A trailing form feed ends the last page; it does not start a new one.
    if normalized.ends_with('\x0c') {
        total -= 1;
        skipped -= 1;
    }
    LoadedDocument {
        source_id: source_id.to_string(),
        pages,
        pages_total: total,
        pages_skipped: skipped,
    }
}
