use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A model's request to run a declared tool. Served at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocationRequest {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    pub call_id: String,
}

/// A capability offered to the model: it decides from `description` when to call it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub arguments_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocationRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn assistant_tool_call(request: ToolInvocationRequest) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: vec![request],
            tool_call_id: None,
        }
    }

    /// Tool output fed back to the model. `call_id` must be the originating request's id.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Append-only message log for one conversation.
///
/// Messages produced during a turn are staged elsewhere and committed together,
/// so a failed turn leaves the log exactly as it was.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn commit(&mut self, staged: Vec<Message>) {
        self.messages.extend(staged);
    }

    /// History followed by `staged`, in send order.
    pub fn with_staged(&self, staged: &[Message]) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + staged.len());
        out.extend_from_slice(&self.messages);
        out.extend_from_slice(staged);
        out
    }

    /// Every tool request in the log has a matching tool-role reply.
    pub fn tool_calls_answered(&self) -> bool {
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .all(|call| {
                self.messages.iter().any(|m| {
                    m.role == Role::Tool && m.tool_call_id.as_deref() == Some(call.call_id.as_str())
                })
            })
    }
}
