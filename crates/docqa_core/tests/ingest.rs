use std::fs;

use docqa_core::ingest::{loader_for_path, DocumentLoader, PdfLoader, TextLoader};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn text_loader_splits_pages_and_counts_skipped() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("notes.txt");
    fs::write(&path, "page one\r\nline two\x0c   \x0cpage three\x0c").expect("write");

    let doc = TextLoader.load(&path).expect("load");
    assert_eq!(doc.pages_total, 3);
    assert_eq!(doc.pages_skipped, 1);
    assert_eq!(doc.pages.len(), 2);
    assert_eq!(doc.pages[0].page, 1);
    assert_eq!(doc.pages[0].text, "page one\nline two");
    assert_eq!(doc.pages[1].page, 3);
    assert_eq!(doc.source_id, path.to_string_lossy());
}

#[test]
fn missing_source_is_fatal() {
    let dir = tempdir().expect("tempdir");
    let err = TextLoader.load(&dir.path().join("absent.txt")).unwrap_err();
    assert_eq!(err.code, "INGEST_SOURCE_UNREADABLE");
}

#[test]
fn corrupt_pdf_is_fatal() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.pdf");
    fs::write(&path, b"this is not a pdf").expect("write");
    let err = PdfLoader.load(&path).unwrap_err();
    assert_eq!(err.code, "INGEST_SOURCE_UNREADABLE");
}

#[test]
fn loader_is_chosen_by_extension() {
    let dir = tempdir().expect("tempdir");
    let pdf = dir.path().join("Report.PDF");
    fs::write(&pdf, b"garbage").expect("write");
    assert!(loader_for_path(&pdf).load(&pdf).is_err());

    let txt = dir.path().join("report.md");
    fs::write(&txt, "# Title\n\nBody").expect("write");
    let doc = loader_for_path(&txt).load(&txt).expect("load");
    assert_eq!(doc.pages.len(), 1);
}
