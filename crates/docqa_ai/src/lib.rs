pub mod compose;
pub mod embeddings;
pub mod evidence;
pub mod filter;
pub mod llm;
pub mod orchestrator;
pub mod provider;
pub mod retrieve;
pub mod tool;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use docqa_core::config::ApiKey;
    use docqa_core::conversation::ToolInvocationRequest;
    use serde_json::Map;

    use super::llm::ModelResponse;
    use super::orchestrator::{AnswerPath, TurnState};
    use super::provider::ProviderClient;

    fn client(url: &str) -> Result<ProviderClient, docqa_core::error::AppError> {
        ProviderClient::new(url, ApiKey::new("k"), Duration::from_secs(5))
    }

    #[test]
    fn provider_base_url_is_hardened() {
        assert!(client("https://clovastudio.stream.ntruss.com/v1/openai").is_ok());
        assert!(client("https://clovastudio.stream.ntruss.com/v1/openai/").is_ok());
        assert!(client("http://127.0.0.1:8080/v1").is_ok());
        assert!(client("http://127.0.0.1").is_ok());

        // Plain http is local-only.
        assert!(client("http://localhost:8080").is_err());
        assert!(client("http://example.com/v1").is_err());
        assert!(client("ftp://example.com").is_err());
        assert!(client("example.com").is_err());

        // Harden against prefix-based bypasses.
        assert!(client("http://127.0.0.1.evil.com:8080").is_err());
        assert!(client("http://127.0.0.1@evil.com:8080").is_err());
        assert!(client("https://user@example.com").is_err());
        assert!(client("http://127.0.0.1:").is_err());
        assert!(client("http://127.0.0.1:0").is_err());
        assert!(client("http://127.0.0.1:99999").is_err());
        assert!(client("https://").is_err());
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let c = client("https://api.example.com/v1/openai/").expect("client");
        assert_eq!(c.base_url(), "https://api.example.com/v1/openai");
        assert_eq!(c.endpoint("/embeddings"), "https://api.example.com/v1/openai/embeddings");
        assert_eq!(
            c.endpoint("chat/completions"),
            "https://api.example.com/v1/openai/chat/completions"
        );
    }

    #[test]
    fn model_response_drives_the_first_transition() {
        let done = TurnState::after_model(ModelResponse::Text("hi".to_string()));
        assert!(done.is_terminal());
        match done {
            TurnState::Done(o) => assert_eq!(o.path, AnswerPath::Direct),
            other => panic!("unexpected state {other:?}"),
        }

        let req = ToolInvocationRequest {
            tool_name: "document_search".to_string(),
            arguments: Map::new(),
            call_id: "call_1".to_string(),
        };
        let waiting = TurnState::after_model(ModelResponse::ToolRequest(req.clone()));
        assert!(!waiting.is_terminal());
        assert_eq!(waiting, TurnState::AwaitingToolResult(req));
    }
}
