use docqa_ai::embeddings::Embedder;
use docqa_ai::evidence::{EvidenceStore, IngestPacing, LoadTrust, Pause};
use docqa_core::chunking::{chunk_document, ChunkParams};
use docqa_core::config::RagConfig;
use docqa_core::error::AppError;
use docqa_core::ingest::loader_for_path;

/// Load the saved index if there is one; otherwise ingest the document and save.
///
/// An index built with a different embedding model is refused. A build that
/// skipped batches is kept in memory but not saved, so the next start retries.
pub fn open_or_build_index(
    cfg: &RagConfig,
    embedder: &dyn Embedder,
    pause: &dyn Pause,
) -> Result<EvidenceStore, AppError> {
    if EvidenceStore::exists(&cfg.index_dir) {
        let store = EvidenceStore::load(&cfg.index_dir, LoadTrust::SelfProduced)?;
        if store.model() != cfg.embedding_model {
            return Err(AppError::new(
                "AI_INDEX_LOAD_FAILED",
                "Saved index was built with a different embedding model",
            )
            .with_details(format!(
                "path={}; index_model={}; configured_model={}",
                cfg.index_dir.display(),
                store.model(),
                cfg.embedding_model
            )));
        }
        return Ok(store);
    }

    let path = cfg.document_path.as_deref().ok_or_else(|| {
        AppError::new("CONFIG_MISSING", "No saved index and no document to build one from")
            .with_details(format!("set DOCQA_DOCUMENT; index_dir={}", cfg.index_dir.display()))
    })?;

    let params = ChunkParams::new(cfg.chunk_size, cfg.chunk_overlap)?;
    let doc = loader_for_path(path).load(path)?;
    let chunks = chunk_document(&doc, params);
    tracing::info!(
        source = %doc.source_id,
        pages = doc.pages.len(),
        chunks = chunks.len(),
        "document chunked"
    );

    let mut store = EvidenceStore::new(cfg.embedding_model.clone());
    let report = store.index(embedder, &chunks, &IngestPacing::from_config(cfg), pause)?;
    tracing::info!(
        embedded = report.embedded,
        skipped = report.skipped,
        retries = report.retries,
        batches = report.batches,
        "ingestion finished"
    );

    if report.skipped > 0 {
        tracing::warn!(skipped = report.skipped, "index incomplete; not saving");
    } else {
        store.save(&cfg.index_dir)?;
    }
    Ok(store)
}
