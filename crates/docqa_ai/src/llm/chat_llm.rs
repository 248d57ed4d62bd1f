use std::io::{BufRead, BufReader};

use docqa_core::conversation::{Message, ToolDeclaration, ToolInvocationRequest};
use docqa_core::error::{AppError, CODE_UNAVAILABLE};
use serde_json::{json, Map, Value};

use super::{Llm, ModelResponse, TextStream};
use crate::provider::{map_call_error, ProviderClient};

/// Chat completions over the OpenAI-compatible wire format, with function tools.
#[derive(Debug, Clone)]
pub struct ChatLlm {
    client: ProviderClient,
}

impl ChatLlm {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }
}

impl Llm for ChatLlm {
    fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<ModelResponse, AppError> {
        let mut body = json!({
            "model": model,
            "messages": messages_to_json(messages),
            "stream": false,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools_to_json(tools));
        }

        let resp = self
            .client
            .post("chat/completions")
            .send_json(body)
            .map_err(|e| map_call_error("chat", e))?;
        let payload: Value = resp.into_json().map_err(|e| {
            AppError::new("AI_CHAT_FAILED", "Failed to decode chat response")
                .with_details(e.to_string())
        })?;
        parse_chat_response(&payload)
    }

    fn stream(&self, model: &str, messages: &[Message]) -> Result<TextStream, AppError> {
        let body = json!({
            "model": model,
            "messages": messages_to_json(messages),
            "stream": true,
        });
        let resp = self
            .client
            .post("chat/completions")
            .set("Accept", "text/event-stream")
            .send_json(body)
            .map_err(|e| map_call_error("chat_stream", e))?;
        Ok(Box::new(SseFragments::new(BufReader::new(resp.into_reader()))))
    }
}

pub fn messages_to_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let mut obj = json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            });
            if !msg.tool_calls.is_empty() {
                obj["tool_calls"] = Value::Array(
                    msg.tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.call_id,
                                "type": "function",
                                "function": {
                                    "name": call.tool_name,
                                    "arguments": Value::Object(call.arguments.clone()).to_string(),
                                }
                            })
                        })
                        .collect(),
                );
            }
            if let Some(call_id) = msg.tool_call_id.as_ref() {
                obj["tool_call_id"] = json!(call_id);
            }
            obj
        })
        .collect()
}

pub fn tools_to_json(tools: &[ToolDeclaration]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.arguments_schema,
                }
            })
        })
        .collect()
}

/// Only the first tool call is honored; extra calls are logged and dropped.
pub fn parse_chat_response(body: &Value) -> Result<ModelResponse, AppError> {
    if let Some(err) = body.get("error") {
        return Err(AppError::new("AI_CHAT_FAILED", "Provider returned an error")
            .with_details(err.to_string()));
    }
    let message = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| AppError::new("AI_CHAT_FAILED", "Chat response had no message"))?;

    let calls = message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);
    if let Some(first) = calls.first() {
        if calls.len() > 1 {
            tracing::warn!(dropped = calls.len() - 1, "model requested several tools; serving the first");
        }
        return parse_tool_call(first).map(ModelResponse::ToolRequest);
    }

    let text = message.get("content").and_then(|c| c.as_str()).unwrap_or("");
    if text.trim().is_empty() {
        return Err(AppError::new("AI_CHAT_FAILED", "Chat response was empty"));
    }
    Ok(ModelResponse::Text(text.to_string()))
}

fn parse_tool_call(call: &Value) -> Result<ToolInvocationRequest, AppError> {
    let malformed = |what: &str| {
        AppError::new("AI_CHAT_FAILED", "Malformed tool call in chat response")
            .with_details(format!("{what}; call={call}"))
    };
    let call_id = call
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing id"))?;
    let function = call.get("function").ok_or_else(|| malformed("missing function"))?;
    let name = function
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing name"))?;
    let arguments: Map<String, Value> = match function.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(obj)) => obj.clone(),
        Some(Value::String(raw)) if raw.trim().is_empty() => Map::new(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(obj)) => obj,
            _ => return Err(malformed("arguments are not a JSON object")),
        },
        Some(_) => return Err(malformed("arguments are not a JSON object")),
    };
    Ok(ToolInvocationRequest {
        tool_name: name.to_string(),
        arguments,
        call_id: call_id.to_string(),
    })
}

/// Server-sent-event reader yielding `choices[0].delta.content` fragments.
pub struct SseFragments<R: BufRead> {
    reader: R,
    finished: bool,
}

impl<R: BufRead> SseFragments<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for SseFragments<R> {
    type Item = Result<String, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    let Some(data) = line.trim().strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim_start();
                    if data == "[DONE]" {
                        self.finished = true;
                        continue;
                    }
                    let event: Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping undecodable stream event");
                            continue;
                        }
                    };
                    if let Some(err) = event.get("error") {
                        self.finished = true;
                        return Some(Err(AppError::new("AI_CHAT_FAILED", "Provider stream reported an error")
                            .with_details(err.to_string())));
                    }
                    if let Some(fragment) = event["choices"][0]["delta"]["content"].as_str() {
                        if !fragment.is_empty() {
                            return Some(Ok(fragment.to_string()));
                        }
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(AppError::new(CODE_UNAVAILABLE, "Answer stream was interrupted")
                        .with_details(e.to_string())
                        .with_retryable(true)));
                }
            }
        }
        None
    }
}
