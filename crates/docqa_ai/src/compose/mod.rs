use docqa_core::conversation::Message;
use docqa_core::domain::Chunk;
use docqa_core::error::AppError;

use crate::llm::{Llm, ModelResponse, TextStream};

mod prompts;

pub use prompts::NO_EVIDENCE_REPLY;

pub const EVIDENCE_SEPARATOR: &str = "\n\n---\n\n";
pub const DEFAULT_EVIDENCE_CHAR_BUDGET: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub evidence_count: usize,
}

impl Prompt {
    pub fn has_evidence(&self) -> bool {
        self.evidence_count > 0
    }
}

/// Builds the answer prompt from accepted evidence and runs it through the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerComposer {
    char_budget: Option<usize>,
}

impl AnswerComposer {
    /// `char_budget` caps each chunk's text in the prompt; 0 means no cap.
    pub fn new(char_budget: usize) -> Self {
        Self {
            char_budget: (char_budget > 0).then_some(char_budget),
        }
    }

    pub fn compose(&self, question: &str, evidence: &[Chunk]) -> Prompt {
        let question = question.trim();
        if evidence.is_empty() {
            return Prompt {
                text: prompts::no_evidence_prompt(question),
                evidence_count: 0,
            };
        }
        Prompt {
            text: prompts::grounded_answer_prompt(question, &self.context_block(evidence)),
            evidence_count: evidence.len(),
        }
    }

    /// Chunk texts, each within the budget, joined by [`EVIDENCE_SEPARATOR`].
    pub fn context_block(&self, evidence: &[Chunk]) -> String {
        evidence
            .iter()
            .map(|c| self.clip(c.text.trim()))
            .collect::<Vec<_>>()
            .join(EVIDENCE_SEPARATOR)
    }

    /// Tool-result payload: the same clipped texts, labeled with their page.
    pub fn tool_result_content(&self, evidence: &[Chunk]) -> String {
        evidence
            .iter()
            .map(|c| {
                let label = match c.page {
                    Some(p) => format!("[page {p}]"),
                    None => "[page ?]".to_string(),
                };
                format!("{label} {}", self.clip(c.text.trim()))
            })
            .collect::<Vec<_>>()
            .join(EVIDENCE_SEPARATOR)
    }

    fn clip<'t>(&self, text: &'t str) -> &'t str {
        match self.char_budget {
            Some(max) => truncate_chars(text, max),
            None => text,
        }
    }

    /// Batched answer. `preamble` is sent ahead of the prompt (e.g. the tool exchange).
    pub fn answer(
        &self,
        llm: &dyn Llm,
        model: &str,
        preamble: &[Message],
        prompt: &Prompt,
    ) -> Result<String, AppError> {
        let messages = with_prompt(preamble, prompt);
        match llm.complete(model, &messages, &[])? {
            ModelResponse::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(AppError::new("AI_CHAT_FAILED", "Answer was empty"));
                }
                Ok(text.to_string())
            }
            ModelResponse::ToolRequest(req) => Err(AppError::new(
                "AI_CHAT_FAILED",
                "Model requested a tool while answering",
            )
            .with_details(format!("tool={}", req.tool_name))),
        }
    }

    /// Streamed answer; the caller concatenates the fragments.
    pub fn answer_stream(
        &self,
        llm: &dyn Llm,
        model: &str,
        preamble: &[Message],
        prompt: &Prompt,
    ) -> Result<TextStream, AppError> {
        llm.stream(model, &with_prompt(preamble, prompt))
    }
}

impl Default for AnswerComposer {
    fn default() -> Self {
        Self::new(DEFAULT_EVIDENCE_CHAR_BUDGET)
    }
}

fn with_prompt(preamble: &[Message], prompt: &Prompt) -> Vec<Message> {
    let mut messages = preamble.to_vec();
    messages.push(Message::user(prompt.text.clone()));
    messages
}

/// The first `max` chars of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
