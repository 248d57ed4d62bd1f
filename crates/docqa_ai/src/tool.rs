use docqa_core::conversation::ToolDeclaration;
use docqa_core::domain::ScoredChunk;
use docqa_core::error::AppError;
use serde_json::{json, Map, Value};

use crate::embeddings::Embedder;
use crate::evidence::EvidenceStore;

pub const RETRIEVAL_TOOL_NAME: &str = "document_search";
pub const DEFAULT_RETRIEVAL_K: usize = 3;

const DEFAULT_DESCRIPTION: &str = "Searches the indexed document for passages relevant to a query. \
Call it whenever the question may be answered by the document's content.";

/// The evidence store's search, exposed as a tool the model can ask for.
pub struct RetrievalTool<'a> {
    store: &'a EvidenceStore,
    embedder: &'a dyn Embedder,
    name: String,
    description: String,
    k: usize,
}

impl<'a> RetrievalTool<'a> {
    pub fn new(store: &'a EvidenceStore, embedder: &'a dyn Embedder, k: usize) -> Self {
        Self {
            store,
            embedder,
            name: RETRIEVAL_TOOL_NAME.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            k,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for in the document."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    pub fn invoke(&self, arguments: &Map<String, Value>) -> Result<Vec<ScoredChunk>, AppError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                AppError::new(
                    "AI_TOOL_ARGUMENTS_INVALID",
                    "Retrieval tool requires a non-empty string `query`",
                )
                .with_details(Value::Object(arguments.clone()).to_string())
            })?;
        self.search(query)
    }

    /// Search with the tool's fixed `k`, bypassing argument parsing.
    pub fn search(&self, query: &str) -> Result<Vec<ScoredChunk>, AppError> {
        tracing::debug!(tool = %self.name, query, k = self.k, "retrieval tool invoked");
        self.store.search(self.embedder, query, self.k)
    }
}
