use docqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::provider::{map_call_error, ProviderClient};

const MAX_INPUT_BYTES: usize = 12_000;

#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    client: ProviderClient,
}

impl RemoteEmbedder {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl Embedder for RemoteEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let mut out = self.embed_batch(model, &[input])?;
        out.pop()
            .ok_or_else(|| AppError::new("AI_EMBEDDINGS_FAILED", "Embeddings response was empty"))
    }

    fn embed_batch(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        // Chunking bounds sizes already; this only guards against pathological input.
        let input = inputs.iter().map(|s| clamp_to_bytes(s, MAX_INPUT_BYTES)).collect();
        let req = EmbeddingsRequest { model, input };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to encode embeddings request")
                .with_details(e.to_string())
        })?;

        let resp = self
            .client
            .post("embeddings")
            .send_json(body)
            .map_err(|e| map_call_error("embeddings", e))?;
        let mut v: EmbeddingsResponse = resp.into_json().map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to decode embeddings response")
                .with_details(e.to_string())
        })?;

        if v.data.len() != inputs.len() {
            return Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Embeddings response count does not match request",
            )
            .with_details(format!("expected={}; got={}", inputs.len(), v.data.len())));
        }
        v.data.sort_by_key(|item| item.index);
        if v.data.iter().any(|item| item.embedding.is_empty()) {
            return Err(AppError::new("AI_EMBEDDINGS_FAILED", "Embeddings response was empty"));
        }
        tracing::debug!(model, inputs = inputs.len(), "embedded batch");
        Ok(v.data.into_iter().map(|item| item.embedding).collect())
    }
}

fn clamp_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
