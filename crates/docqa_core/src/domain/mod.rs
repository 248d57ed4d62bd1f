use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A bounded slice of source text with provenance. The unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_id: String,
    pub page: Option<u32>,
    /// `[start, end)` byte range of `text` within the page text.
    pub offset_range: Option<[usize; 2]>,
}

impl Chunk {
    /// Build a chunk whose id is derived from its provenance, so re-ingesting the
    /// same region of the same source yields the same id and supersedes it.
    pub fn new(
        source_id: &str,
        page: Option<u32>,
        offset_range: Option<[usize; 2]>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: chunk_id_for(source_id, page, offset_range.map(|r| r[0])),
            text: text.into(),
            source_id: source_id.to_string(),
            page,
            offset_range,
        }
    }

    pub fn text_sha256(&self) -> String {
        text_sha256(&self.text)
    }
}

/// A chunk paired with a provider-defined similarity score. Produced per query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

pub fn chunk_id_for(source_id: &str, page: Option<u32>, start: Option<usize>) -> String {
    let page = page.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
    let start = start.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
    let payload = format!("source={source_id}\npage={page}\nstart={start}");
    hex::encode(Sha256::digest(payload.as_bytes()))
}

pub fn text_sha256(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
