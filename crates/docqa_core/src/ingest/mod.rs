use std::path::Path;

use crate::error::AppError;

pub mod pdf;
pub mod text;

pub use pdf::PdfLoader;
pub use text::TextLoader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number.
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub source_id: String,
    pub pages: Vec<PageText>,
    pub pages_total: u32,
    pub pages_skipped: u32,
}

/// Produces ordered page texts from a source file.
///
/// Unreadable pages are skipped and counted. Failing to open the source at all
/// is an `INGEST_SOURCE_UNREADABLE` error.
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<LoadedDocument, AppError>;
}

/// `.pdf` goes through the PDF loader; everything else is read as text.
pub fn loader_for_path(path: &Path) -> Box<dyn DocumentLoader> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        Box::new(PdfLoader)
    } else {
        Box::new(TextLoader)
    }
}

pub fn source_id_for(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub(crate) fn log_load_summary(doc: &LoadedDocument) {
    if doc.pages_skipped > 0 {
        tracing::warn!(
            source = %doc.source_id,
            skipped = doc.pages_skipped,
            total = doc.pages_total,
            "skipped unreadable or empty pages"
        );
    }
    tracing::info!(
        source = %doc.source_id,
        pages = doc.pages.len(),
        total = doc.pages_total,
        "document loaded"
    );
}
