use docqa_core::conversation::{Message, ToolDeclaration, ToolInvocationRequest};
use docqa_core::error::AppError;

/// What the model produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    Text(String),
    ToolRequest(ToolInvocationRequest),
}

/// Lazy answer fragments. Finite, consumed once; ends at the provider's end-of-stream.
pub type TextStream = Box<dyn Iterator<Item = Result<String, AppError>>>;

pub trait Llm {
    fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<ModelResponse, AppError>;

    /// Streamed completion without tools. Providers that cannot stream yield one fragment.
    fn stream(&self, model: &str, messages: &[Message]) -> Result<TextStream, AppError> {
        match self.complete(model, messages, &[])? {
            ModelResponse::Text(text) => Ok(Box::new(std::iter::once(Ok(text)))),
            ModelResponse::ToolRequest(req) => Err(AppError::new(
                "AI_CHAT_FAILED",
                "Model requested a tool where none was offered",
            )
            .with_details(format!("tool={}", req.tool_name))),
        }
    }
}

pub mod chat_llm;
