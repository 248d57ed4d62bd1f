use std::io;

use docqa_ai::compose::AnswerComposer;
use docqa_ai::embeddings::remote_embed::RemoteEmbedder;
use docqa_ai::evidence::ThreadPause;
use docqa_ai::llm::chat_llm::ChatLlm;
use docqa_ai::orchestrator::{Orchestrator, TurnSettings};
use docqa_ai::provider::ProviderClient;
use docqa_ai::tool::RetrievalTool;
use docqa_core::config::RagConfig;
use docqa_core::error::AppError;

pub mod logging;
pub mod repl;
pub mod startup;

pub fn run() -> Result<(), AppError> {
    let cfg = RagConfig::from_env()?;
    tracing::info!(
        chat_model = %cfg.chat_model,
        embedding_model = %cfg.embedding_model,
        index_dir = %cfg.index_dir.display(),
        mode = ?cfg.retrieval_mode,
        "starting"
    );

    let client = ProviderClient::new(&cfg.api_base, cfg.api_key.clone(), cfg.request_timeout)?;
    let embedder = RemoteEmbedder::new(client.clone());
    let llm = ChatLlm::new(client);

    let store = startup::open_or_build_index(&cfg, &embedder, &ThreadPause)?;
    if store.is_empty() {
        tracing::warn!("index is empty; every retrieval will fall back");
    } else {
        tracing::info!(chunks = store.len(), dims = ?store.dims(), model = %store.model(), "index ready");
    }

    let mut orchestrator = Orchestrator::new(
        &llm,
        RetrievalTool::new(&store, &embedder, cfg.retrieval_k),
        AnswerComposer::new(cfg.evidence_char_budget),
        TurnSettings::from_config(&cfg),
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let summary = repl::run_loop(&mut orchestrator, stdin.lock(), &mut stdout.lock()).map_err(|e| {
        AppError::new("CLI_IO_FAILED", "Failed to read input or write output").with_details(e.to_string())
    })?;
    tracing::info!(turns = summary.turns, failed = summary.failed, "session ended");
    Ok(())
}
