use docqa_core::config::{FallbackPolicy, RagConfig, RetrievalMode};
use docqa_core::conversation::{Conversation, Message, ToolInvocationRequest};
use docqa_core::domain::Chunk;
use docqa_core::error::AppError;

use crate::compose::{AnswerComposer, Prompt};
use crate::filter::{filter, DEFAULT_RELEVANCE_THRESHOLD};
use crate::llm::{Llm, ModelResponse};
use crate::tool::RetrievalTool;

/// Reply used when retrieval finds nothing relevant and the policy is [`FallbackPolicy::Canned`].
pub const FALLBACK_MESSAGE: &str =
    "I could not find relevant information about this in the indexed document.";

/// Tool-result content sent back to the model when every passage was filtered out.
pub const NO_PASSAGES_TOOL_RESULT: &str = "No passages scored above the relevance threshold.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerPath {
    /// The model answered without retrieving.
    Direct,
    /// Answered from the listed chunks.
    Grounded { chunk_ids: Vec<String> },
    /// Retrieval ran but nothing cleared the threshold.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub answer: String,
    pub path: AnswerPath,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    AwaitingModel,
    AwaitingToolResult(ToolInvocationRequest),
    Done(TurnOutcome),
}

impl TurnState {
    /// Transition out of `AwaitingModel`.
    pub fn after_model(response: ModelResponse) -> Self {
        match response {
            ModelResponse::Text(answer) => TurnState::Done(TurnOutcome {
                answer,
                path: AnswerPath::Direct,
            }),
            ModelResponse::ToolRequest(request) => TurnState::AwaitingToolResult(request),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnSettings {
    pub chat_model: String,
    pub relevance_threshold: f32,
    pub fallback: FallbackPolicy,
    pub mode: RetrievalMode,
    pub stream: bool,
}

impl TurnSettings {
    pub fn from_config(cfg: &RagConfig) -> Self {
        Self {
            chat_model: cfg.chat_model.clone(),
            relevance_threshold: cfg.relevance_threshold,
            fallback: cfg.fallback,
            mode: cfg.retrieval_mode,
            stream: cfg.stream,
        }
    }

    pub fn new(chat_model: impl Into<String>) -> Self {
        Self {
            chat_model: chat_model.into(),
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            fallback: FallbackPolicy::Canned,
            mode: RetrievalMode::Tool,
            stream: false,
        }
    }
}

/// Runs one conversation, a turn at a time.
///
/// Each turn serves at most one retrieval request. Messages produced during a
/// turn are staged and committed to the conversation only when the turn reaches
/// `Done`; a failed turn leaves the history untouched.
pub struct Orchestrator<'a> {
    llm: &'a dyn Llm,
    tool: RetrievalTool<'a>,
    composer: AnswerComposer,
    settings: TurnSettings,
    conversation: Conversation,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        llm: &'a dyn Llm,
        tool: RetrievalTool<'a>,
        composer: AnswerComposer,
        settings: TurnSettings,
    ) -> Self {
        Self {
            llm,
            tool,
            composer,
            settings,
            conversation: Conversation::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    pub fn run_turn(&mut self, utterance: &str) -> Result<TurnOutcome, AppError> {
        self.run_turn_with(utterance, &mut |_: &str| {})
    }

    /// Like [`Orchestrator::run_turn`], forwarding answer text to `on_fragment` as it arrives.
    pub fn run_turn_with(
        &mut self,
        utterance: &str,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome, AppError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(AppError::new("TURN_EMPTY_INPUT", "Question must not be empty"));
        }

        let mut staged = vec![Message::user(utterance)];
        let outcome = match self.settings.mode {
            RetrievalMode::Tool => self.drive(utterance, &mut staged, on_fragment),
            RetrievalMode::Always => self.retrieve_first(utterance, on_fragment),
        };
        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, details = ?e.details, "turn failed; history unchanged");
                return Err(e);
            }
        };

        staged.push(Message::assistant(outcome.answer.clone()));
        self.conversation.commit(staged);
        tracing::info!(path = ?outcome.path, history = self.conversation.len(), "turn complete");
        Ok(outcome)
    }

    fn drive(
        &self,
        utterance: &str,
        staged: &mut Vec<Message>,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome, AppError> {
        let tools = [self.tool.declaration()];
        let mut state = TurnState::AwaitingModel;
        loop {
            state = match state {
                TurnState::AwaitingModel => {
                    let messages = self.conversation.with_staged(staged);
                    let response = self.llm.complete(&self.settings.chat_model, &messages, &tools)?;
                    let next = TurnState::after_model(response);
                    if let TurnState::Done(outcome) = &next {
                        on_fragment(&outcome.answer);
                    }
                    next
                }
                TurnState::AwaitingToolResult(request) => {
                    self.serve_tool_request(utterance, request, staged, on_fragment)?
                }
                TurnState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn serve_tool_request(
        &self,
        utterance: &str,
        request: ToolInvocationRequest,
        staged: &mut Vec<Message>,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<TurnState, AppError> {
        if request.tool_name != self.tool.name() {
            return Err(AppError::new("AI_TOOL_UNKNOWN", "Model requested an unknown tool")
                .with_details(format!("tool={}", request.tool_name)));
        }
        tracing::info!(
            tool = %request.tool_name,
            call_id = %request.call_id,
            k = self.tool.k(),
            "serving tool request"
        );

        let results = self.tool.invoke(&request.arguments)?;
        let accepted = filter(&results, self.settings.relevance_threshold);
        tracing::info!(
            retrieved = results.len(),
            accepted = accepted.len(),
            threshold = self.settings.relevance_threshold,
            "tool results filtered"
        );

        let call_id = request.call_id.clone();
        staged.push(Message::assistant_tool_call(request));
        let tool_content = if accepted.is_empty() {
            NO_PASSAGES_TOOL_RESULT.to_string()
        } else {
            self.composer.tool_result_content(&accepted)
        };
        staged.push(Message::tool_result(call_id, tool_content));

        let preamble = self.conversation.with_staged(staged);
        let outcome = self.conclude(utterance, &accepted, &preamble, on_fragment)?;
        Ok(TurnState::Done(outcome))
    }

    /// Straight retrieval: search the utterance, then answer from what survives.
    fn retrieve_first(
        &self,
        utterance: &str,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome, AppError> {
        let results = self.tool.search(utterance)?;
        let accepted = filter(&results, self.settings.relevance_threshold);
        tracing::info!(
            retrieved = results.len(),
            accepted = accepted.len(),
            threshold = self.settings.relevance_threshold,
            "search results filtered"
        );
        self.conclude(utterance, &accepted, self.conversation.messages(), on_fragment)
    }

    fn conclude(
        &self,
        question: &str,
        accepted: &[Chunk],
        preamble: &[Message],
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome, AppError> {
        if accepted.is_empty() {
            let answer = match self.settings.fallback {
                FallbackPolicy::Canned => {
                    on_fragment(FALLBACK_MESSAGE);
                    FALLBACK_MESSAGE.to_string()
                }
                FallbackPolicy::Compose => {
                    let prompt = self.composer.compose(question, &[]);
                    self.deliver(preamble, &prompt, on_fragment)?
                }
            };
            return Ok(TurnOutcome {
                answer,
                path: AnswerPath::Fallback,
            });
        }

        let prompt = self.composer.compose(question, accepted);
        let answer = self.deliver(preamble, &prompt, on_fragment)?;
        Ok(TurnOutcome {
            answer,
            path: AnswerPath::Grounded {
                chunk_ids: accepted.iter().map(|c| c.id.clone()).collect(),
            },
        })
    }

    fn deliver(
        &self,
        preamble: &[Message],
        prompt: &Prompt,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<String, AppError> {
        let model = self.settings.chat_model.as_str();
        if !self.settings.stream {
            let answer = self.composer.answer(self.llm, model, preamble, prompt)?;
            on_fragment(&answer);
            return Ok(answer);
        }

        let mut answer = String::new();
        for fragment in self.composer.answer_stream(self.llm, model, preamble, prompt)? {
            let fragment = fragment?;
            on_fragment(&fragment);
            answer.push_str(&fragment);
        }
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            return Err(AppError::new("AI_CHAT_FAILED", "Answer stream was empty"));
        }
        Ok(trimmed.to_string())
    }
}
