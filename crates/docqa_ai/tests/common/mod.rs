#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use docqa_ai::embeddings::Embedder;
use docqa_ai::evidence::{EvidenceStore, IngestPacing, Pause};
use docqa_ai::llm::{Llm, ModelResponse, TextStream};
use docqa_core::conversation::{Message, ToolDeclaration, ToolInvocationRequest};
use docqa_core::domain::Chunk;
use docqa_core::error::AppError;
use serde_json::{Map, Value};

pub const MODEL: &str = "mock-emb";

/// One dimension per keyword (present or not), plus a small constant so no
/// vector has zero norm.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    pub calls: Cell<u32>,
    pub batch_sizes: RefCell<Vec<usize>>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            calls: Cell::new(0),
            batch_sizes: RefCell::new(Vec::new()),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| if lower.contains(k.as_str()) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.01);
        v
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.vector(input))
    }

    fn embed_batch(&self, _model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        self.calls.set(self.calls.get() + 1);
        self.batch_sizes.borrow_mut().push(inputs.len());
        Ok(inputs.iter().map(|i| self.vector(i)).collect())
    }
}

/// Fails the first `failures` batch calls with `error`, then delegates.
pub struct FlakyEmbedder {
    pub inner: KeywordEmbedder,
    failures_left: Cell<u32>,
    error: AppError,
}

impl FlakyEmbedder {
    pub fn new(inner: KeywordEmbedder, failures: u32, error: AppError) -> Self {
        Self {
            inner,
            failures_left: Cell::new(failures),
            error,
        }
    }
}

impl Embedder for FlakyEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.inner.embed(model, input)
    }

    fn embed_batch(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(self.error.clone());
        }
        self.inner.embed_batch(model, inputs)
    }
}

#[derive(Default)]
pub struct RecordingPause {
    pub waits: RefCell<Vec<Duration>>,
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDeclaration>,
    pub streamed: bool,
}

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: RefCell<VecDeque<Result<ModelResponse, AppError>>>,
    streams: RefCell<VecDeque<Vec<Result<String, AppError>>>>,
    pub seen: RefCell<Vec<SeenRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Result<ModelResponse, AppError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn with_stream(self, fragments: Vec<Result<String, AppError>>) -> Self {
        self.streams.borrow_mut().push_back(fragments);
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn last(&self) -> SeenRequest {
        self.seen.borrow().last().cloned().expect("no requests recorded")
    }
}

impl Llm for ScriptedLlm {
    fn complete(
        &self,
        _model: &str,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<ModelResponse, AppError> {
        self.seen.borrow_mut().push(SeenRequest {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            streamed: false,
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::new("AI_CHAT_FAILED", "script exhausted")))
    }

    fn stream(&self, _model: &str, messages: &[Message]) -> Result<TextStream, AppError> {
        self.seen.borrow_mut().push(SeenRequest {
            messages: messages.to_vec(),
            tools: Vec::new(),
            streamed: true,
        });
        let fragments = self
            .streams
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| AppError::new("AI_CHAT_FAILED", "stream script exhausted"))?;
        Ok(Box::new(fragments.into_iter()))
    }
}

pub fn text(s: &str) -> Result<ModelResponse, AppError> {
    Ok(ModelResponse::Text(s.to_string()))
}

pub fn tool_request(name: &str, query: Option<&str>, call_id: &str) -> Result<ModelResponse, AppError> {
    let mut arguments = Map::new();
    if let Some(q) = query {
        arguments.insert("query".to_string(), Value::String(q.to_string()));
    }
    Ok(ModelResponse::ToolRequest(ToolInvocationRequest {
        tool_name: name.to_string(),
        arguments,
        call_id: call_id.to_string(),
    }))
}

pub fn chunk(source: &str, page: u32, start: usize, text: &str) -> Chunk {
    Chunk::new(source, Some(page), Some([start, start + text.len()]), text)
}

pub fn security_chunks() -> Vec<Chunk> {
    vec![
        chunk("report.pdf", 1, 0, "LockBit is a ransomware group that encrypts victim files."),
        chunk("report.pdf", 1, 120, "Phishing emails remain the most common initial access vector."),
        chunk("report.pdf", 2, 0, "Quarterly revenue of the vendor grew by ten percent."),
    ]
}

pub fn security_embedder() -> KeywordEmbedder {
    KeywordEmbedder::new(&["ransomware", "phishing", "revenue"])
}

pub fn no_wait_pacing() -> IngestPacing {
    IngestPacing {
        batch_size: 2,
        batch_delay: Duration::ZERO,
        max_retries: 0,
    }
}

pub fn indexed_store(embedder: &dyn Embedder, chunks: &[Chunk]) -> EvidenceStore {
    let mut store = EvidenceStore::new(MODEL);
    store
        .index(embedder, chunks, &no_wait_pacing(), &RecordingPause::default())
        .expect("index");
    store
}
