use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use docqa_core::domain::{Chunk, ScoredChunk};
use docqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::pacing::{IngestPacing, Pause};
use super::persist::{read_json, IndexFiles, IndexStatus, FORMAT_VERSION};
use crate::embeddings::Embedder;
use crate::retrieve::top_k;

/// How far a saved index is trusted when loading it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTrust {
    /// Written by this program into a directory it controls.
    SelfProduced,
    Untrusted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    pub batches: u32,
    pub embedded: u32,
    pub unchanged: u32,
    pub skipped: u32,
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct IndexedChunk {
    chunk: Chunk,
    text_sha256: String,
    vector: Vec<f32>,
}

/// Chunks plus their embeddings, searchable by cosine similarity.
///
/// Keyed by chunk id: indexing an existing id overwrites it, and unchanged text
/// is never re-embedded.
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    model: String,
    dims: Option<u32>,
    entries: BTreeMap<String, IndexedChunk>,
}

impl EvidenceStore {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            dims: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> Option<u32> {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.entries.get(chunk_id).map(|e| &e.chunk)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.values().map(|e| &e.chunk)
    }

    /// Embed and store `chunks`, pacing provider calls per `pacing`.
    ///
    /// Rate-limited batches are retried with back-off up to `max_retries`. A batch
    /// the provider rejects is skipped and counted; rate-limit exhaustion and an
    /// unavailable provider abort the ingestion.
    pub fn index(
        &mut self,
        embedder: &dyn Embedder,
        chunks: &[Chunk],
        pacing: &IngestPacing,
        pause: &dyn Pause,
    ) -> Result<IngestReport, AppError> {
        let mut report = IngestReport::default();

        // Last occurrence of an id wins; first-seen order is kept.
        let mut latest: BTreeMap<&str, &Chunk> = BTreeMap::new();
        let mut order: Vec<&str> = Vec::new();
        for c in chunks {
            if latest.insert(c.id.as_str(), c).is_none() {
                order.push(c.id.as_str());
            }
        }

        let mut to_embed: Vec<(&Chunk, String)> = Vec::new();
        for id in order {
            let Some(chunk) = latest.get(id).copied() else {
                continue;
            };
            let hash = chunk.text_sha256();
            match self.entries.get_mut(id) {
                Some(existing) if existing.text_sha256 == hash => {
                    existing.chunk = chunk.clone();
                    report.unchanged += 1;
                }
                _ => to_embed.push((chunk, hash)),
            }
        }

        let batch_size = pacing.batch_size.max(1);
        let total = to_embed.len();
        for (batch_no, batch) in to_embed.chunks(batch_size).enumerate() {
            if batch_no > 0 {
                pause.pause(pacing.batch_delay);
            }
            report.batches += 1;

            let inputs: Vec<&str> = batch.iter().map(|(c, _)| c.text.as_str()).collect();
            let vectors = match self.embed_with_retry(embedder, &inputs, pacing, pause, &mut report) {
                Ok(v) => v,
                Err(e) if e.is_rate_limited() || e.is_provider_unavailable() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        batch = batch_no,
                        chunks = batch.len(),
                        error = %e,
                        "skipping batch the provider could not embed"
                    );
                    report.skipped += batch.len() as u32;
                    continue;
                }
            };
            if vectors.len() != batch.len() {
                tracing::warn!(
                    batch = batch_no,
                    expected = batch.len(),
                    got = vectors.len(),
                    "skipping batch with a mismatched vector count"
                );
                report.skipped += batch.len() as u32;
                continue;
            }

            for ((chunk, hash), vector) in batch.iter().zip(vectors) {
                self.check_dims(&chunk.id, &vector)?;
                self.entries.insert(
                    chunk.id.clone(),
                    IndexedChunk {
                        chunk: (*chunk).clone(),
                        text_sha256: hash.clone(),
                        vector,
                    },
                );
                report.embedded += 1;
            }
            tracing::info!(
                done = report.embedded + report.skipped,
                total,
                "embedded batch {}",
                batch_no + 1
            );
        }

        Ok(report)
    }

    fn embed_with_retry(
        &self,
        embedder: &dyn Embedder,
        inputs: &[&str],
        pacing: &IngestPacing,
        pause: &dyn Pause,
        report: &mut IngestReport,
    ) -> Result<Vec<Vec<f32>>, AppError> {
        let mut attempt = 0u32;
        loop {
            match embedder.embed_batch(&self.model, inputs) {
                Err(e) if e.is_rate_limited() && attempt < pacing.max_retries => {
                    let wait = pacing.backoff(attempt);
                    tracing::warn!(attempt = attempt + 1, wait_ms = wait.as_millis() as u64, "rate limited; backing off");
                    pause.pause(wait);
                    attempt += 1;
                    report.retries += 1;
                }
                other => return other,
            }
        }
    }

    fn check_dims(&mut self, chunk_id: &str, vector: &[f32]) -> Result<(), AppError> {
        let this = vector.len() as u32;
        if this == 0 {
            return Err(AppError::new("AI_EMBEDDINGS_FAILED", "Embedding was empty")
                .with_details(format!("chunk_id={chunk_id}")));
        }
        match self.dims {
            Some(d) if d != this => Err(AppError::new(
                "AI_INDEX_BUILD_FAILED",
                "Embedding dimension mismatch across chunks",
            )
            .with_details(format!("expected={d}; got={this}; chunk_id={chunk_id}"))),
            Some(_) => Ok(()),
            None => {
                self.dims = Some(this);
                Ok(())
            }
        }
    }

    /// Up to `k` chunks by descending similarity. An empty store yields no results.
    pub fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        let q = query.trim();
        if q.is_empty() {
            return Err(AppError::new("AI_RETRIEVAL_FAILED", "Query must not be empty"));
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let qv = embedder.embed(&self.model, q)?;
        if let Some(dims) = self.dims {
            if qv.len() as u32 != dims {
                return Err(AppError::new(
                    "AI_RETRIEVAL_FAILED",
                    "Query embedding dims do not match index dims",
                )
                .with_details(format!("index_dims={dims}; query_dims={}", qv.len())));
            }
        }

        let candidates = self
            .entries
            .iter()
            .map(|(id, e)| (id.as_str(), e.vector.as_slice()));
        let hits = top_k(&qv, candidates, k)?;

        let out: Vec<ScoredChunk> = hits
            .into_iter()
            .filter_map(|(id, score)| {
                self.entries.get(&id).map(|e| ScoredChunk {
                    chunk: e.chunk.clone(),
                    score,
                })
            })
            .collect();
        tracing::debug!(k, hits = out.len(), "search complete");
        Ok(out)
    }

    /// Whether `dir` holds a completed save.
    pub fn exists(dir: &Path) -> bool {
        IndexFiles::new(dir).status_path().is_file()
    }

    pub fn save(&self, dir: &Path) -> Result<(), AppError> {
        let files = IndexFiles::new(dir);
        let chunks: Vec<Chunk> = self.entries.values().map(|e| e.chunk.clone()).collect();
        let vectors: BTreeMap<String, Vec<f32>> = self
            .entries
            .iter()
            .map(|(id, e)| (id.clone(), e.vector.clone()))
            .collect();
        let hashes: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|(id, e)| (id.clone(), e.text_sha256.clone()))
            .collect();
        let status = IndexStatus {
            format_version: FORMAT_VERSION,
            model: self.model.clone(),
            dims: self.dims,
            chunk_count: self.entries.len() as u32,
        };
        files.write_all(&status, &chunks, &vectors, &hashes)?;
        tracing::info!(path = %dir.display(), chunks = chunks.len(), "index saved");
        Ok(())
    }

    /// Load a directory written by [`EvidenceStore::save`].
    ///
    /// Only self-produced content is accepted. Structure and text hashes are
    /// still verified.
    pub fn load(dir: &Path, trust: LoadTrust) -> Result<Self, AppError> {
        if trust != LoadTrust::SelfProduced {
            return Err(AppError::new(
                "AI_INDEX_UNTRUSTED",
                "Refusing to load an index this program did not produce",
            )
            .with_details(format!("path={}", dir.display())));
        }

        let files = IndexFiles::new(dir);
        let status: IndexStatus = read_json(&files.status_path(), "index status")?;
        if status.format_version != FORMAT_VERSION {
            return Err(AppError::new("AI_INDEX_CORRUPT", "Unsupported index format version")
                .with_details(format!("found={}; expected={FORMAT_VERSION}", status.format_version)));
        }
        let chunks: Vec<Chunk> = read_json(&files.chunks_path(), "index chunks")?;
        let mut vectors: BTreeMap<String, Vec<f32>> = read_json(&files.vectors_path(), "index vectors")?;
        let mut hashes: BTreeMap<String, String> = read_json(&files.hashes_path(), "index hashes")?;

        let corrupt = |why: String| AppError::new("AI_INDEX_CORRUPT", "Saved index is inconsistent").with_details(why);

        let ids: BTreeSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        if ids.len() != chunks.len() || chunks.len() != status.chunk_count as usize {
            return Err(corrupt(format!(
                "chunks={}; unique_ids={}; status_count={}",
                chunks.len(),
                ids.len(),
                status.chunk_count
            )));
        }
        if vectors.len() != chunks.len() || hashes.len() != chunks.len() {
            return Err(corrupt(format!(
                "chunks={}; vectors={}; hashes={}",
                chunks.len(),
                vectors.len(),
                hashes.len()
            )));
        }

        let mut entries = BTreeMap::new();
        for chunk in chunks {
            let vector = vectors
                .remove(&chunk.id)
                .ok_or_else(|| corrupt(format!("missing vector; chunk_id={}", chunk.id)))?;
            let text_sha256 = hashes
                .remove(&chunk.id)
                .ok_or_else(|| corrupt(format!("missing hash; chunk_id={}", chunk.id)))?;
            if text_sha256 != chunk.text_sha256() {
                return Err(corrupt(format!("text hash mismatch; chunk_id={}", chunk.id)));
            }
            if Some(vector.len() as u32) != status.dims {
                return Err(corrupt(format!(
                    "dims mismatch; chunk_id={}; expected={:?}; got={}",
                    chunk.id,
                    status.dims,
                    vector.len()
                )));
            }
            entries.insert(
                chunk.id.clone(),
                IndexedChunk {
                    chunk,
                    text_sha256,
                    vector,
                },
            );
        }

        tracing::info!(path = %dir.display(), chunks = entries.len(), model = %status.model, "index loaded");
        Ok(Self {
            model: status.model,
            dims: status.dims,
            entries,
        })
    }
}
