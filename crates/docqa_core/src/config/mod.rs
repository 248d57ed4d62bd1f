use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const ENV_API_KEY: &str = "CLOVASTUDIO_API_KEY";
pub const ENV_PREFIX: &str = "DOCQA_";

pub const DEFAULT_API_BASE: &str = "https://clovastudio.stream.ntruss.com/v1/openai";
pub const DEFAULT_EMBEDDING_MODEL: &str = "clir-emb-dolphin";
pub const DEFAULT_CHAT_MODEL: &str = "HCX-005";
pub const DEFAULT_INDEX_DIR: &str = "docqa_index";

/// Provider secret. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// The model decides whether to call the retrieval tool.
    #[serde(alias = "Tool", alias = "TOOL")]
    Tool,
    /// Every question is searched before the model is asked.
    #[serde(alias = "Always", alias = "ALWAYS")]
    Always,
}

/// What a turn does when no retrieved chunk clears the relevance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Reply with a fixed message; no second model call.
    #[serde(alias = "Canned", alias = "CANNED")]
    Canned,
    /// Ask the model again with an explicit "no evidence" prompt.
    #[serde(alias = "Compose", alias = "COMPOSE")]
    Compose,
}

/// Runtime settings. Serde names match the environment variables with the
/// `DOCQA_` prefix stripped and lowercased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(rename = "clovastudio_api_key", default, skip_serializing)]
    pub api_key: ApiKey,
    pub api_base: String,
    pub embedding_model: String,
    pub chat_model: String,
    #[serde(rename = "document", default)]
    pub document_path: Option<PathBuf>,
    pub index_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_k: usize,
    pub relevance_threshold: f32,
    pub ingest_batch_size: usize,
    #[serde(rename = "ingest_batch_delay_secs", with = "seconds")]
    pub ingest_batch_delay: Duration,
    pub ingest_max_retries: u32,
    /// Characters kept per chunk when building the answer prompt; 0 keeps all.
    pub evidence_char_budget: usize,
    pub retrieval_mode: RetrievalMode,
    pub fallback: FallbackPolicy,
    pub stream: bool,
    #[serde(rename = "request_timeout_secs", with = "seconds")]
    pub request_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            api_base: DEFAULT_API_BASE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            document_path: None,
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            chunk_size: 500,
            chunk_overlap: 50,
            retrieval_k: 3,
            relevance_threshold: 0.75,
            ingest_batch_size: 2,
            ingest_batch_delay: Duration::from_secs(1),
            ingest_max_retries: 3,
            evidence_char_budget: 300,
            retrieval_mode: RetrievalMode::Tool,
            fallback: FallbackPolicy::Canned,
            stream: true,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RagConfig {
    /// Defaults, then `DOCQA_*` variables, then the provider key.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(RagConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Env::raw().only(&[ENV_API_KEY]))
    }

    pub fn from_env() -> Result<Self, AppError> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, AppError> {
        let mut cfg: RagConfig = figment.extract().map_err(extract_error)?;

        let key = cfg.api_key.expose().trim().to_string();
        if key.is_empty() {
            return Err(AppError::new("CONFIG_MISSING", "Provider API key is not configured")
                .with_details(format!("set {ENV_API_KEY}")));
        }
        cfg.api_key = ApiKey::new(key);

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(invalid("DOCQA_CHUNK_SIZE", "0", "must be at least 1"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(invalid(
                "DOCQA_CHUNK_OVERLAP",
                &self.chunk_overlap.to_string(),
                "must be smaller than DOCQA_CHUNK_SIZE",
            ));
        }
        if self.retrieval_k == 0 {
            return Err(invalid("DOCQA_RETRIEVAL_K", "0", "must be at least 1"));
        }
        if !self.relevance_threshold.is_finite() {
            return Err(invalid(
                "DOCQA_RELEVANCE_THRESHOLD",
                &self.relevance_threshold.to_string(),
                "must be a finite number",
            ));
        }
        if self.ingest_batch_size == 0 {
            return Err(invalid("DOCQA_INGEST_BATCH_SIZE", "0", "must be at least 1"));
        }
        if self.embedding_model.trim().is_empty() || self.chat_model.trim().is_empty() {
            return Err(AppError::new("CONFIG_INVALID", "Model identifiers must not be empty"));
        }
        Ok(())
    }
}

/// Environment variable a figment key path came from.
fn env_var_for(path: &[String]) -> String {
    match path.first().map(String::as_str) {
        None => "configuration".to_string(),
        Some("clovastudio_api_key") => ENV_API_KEY.to_string(),
        Some(_) => format!("{ENV_PREFIX}{}", path.join("__").to_uppercase()),
    }
}

fn extract_error(err: figment::Error) -> AppError {
    let key = env_var_for(&err.path);
    AppError::new("CONFIG_INVALID", format!("Invalid value for {key}")).with_details(err.to_string())
}

fn invalid(key: &str, value: &str, why: &str) -> AppError {
    AppError::new("CONFIG_INVALID", format!("Invalid value for {key}"))
        .with_details(format!("value={value}; {why}"))
}

/// Durations as fractional seconds.
mod seconds {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = f64::deserialize(d)?;
        Duration::try_from_secs_f64(raw)
            .map_err(|_| D::Error::custom(format!("{raw} is not a non-negative number of seconds")))
    }
}
