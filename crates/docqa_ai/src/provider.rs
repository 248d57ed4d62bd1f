use std::time::Duration;

use docqa_core::config::ApiKey;
use docqa_core::error::{AppError, CODE_RATE_LIMITED, CODE_REJECTED, CODE_UNAVAILABLE};

/// Connection settings for an OpenAI-compatible provider (embeddings + chat).
#[derive(Debug, Clone)]
pub struct ProviderClient {
    base_url: String,
    api_key: ApiKey,
    timeout: Duration,
}

impl ProviderClient {
    /// Remote providers must use `https`. Plain `http` is only accepted for `127.0.0.1`.
    pub fn new(base_url: &str, api_key: ApiKey, timeout: Duration) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        let rejected = || {
            AppError::new(
                "AI_PROVIDER_URL_INVALID",
                "Provider base URL must be https, or http on 127.0.0.1",
            )
            .with_details(format!("base_url={base_url}"))
        };

        let (rest, local_only) = if let Some(rest) = base_url.strip_prefix("https://") {
            (rest, false)
        } else if let Some(rest) = base_url.strip_prefix("http://") {
            (rest, true)
        } else {
            return Err(rejected());
        };

        let authority = rest.split('/').next().unwrap_or("");
        if authority.is_empty() || authority.contains('@') || authority.chars().any(char::is_whitespace) {
            return Err(rejected());
        }
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        };
        if host.is_empty() || (local_only && host != "127.0.0.1") {
            return Err(rejected());
        }
        if let Some(port) = port {
            match port.parse::<u16>() {
                Ok(p) if p != 0 => {}
                _ => return Err(rejected()),
            }
        }

        Ok(Self {
            base_url,
            api_key,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn post(&self, path: &str) -> ureq::Request {
        ureq::post(&self.endpoint(path))
            .timeout(self.timeout)
            .set("Authorization", &format!("Bearer {}", self.api_key.expose()))
            .set("Content-Type", "application/json")
    }
}

/// Map a failed provider call onto the error taxonomy.
pub(crate) fn map_call_error(operation: &str, err: ureq::Error) -> AppError {
    match err {
        ureq::Error::Status(429, resp) => {
            let retry_after = resp.header("retry-after").unwrap_or("-").to_string();
            AppError::new(CODE_RATE_LIMITED, "Provider rate limit reached")
                .with_details(format!("op={operation}; status=429; retry_after={retry_after}"))
                .with_retryable(true)
        }
        ureq::Error::Status(status @ (401 | 403), _) => {
            AppError::new(CODE_UNAVAILABLE, "Provider rejected the credentials")
                .with_details(format!("op={operation}; status={status}"))
        }
        ureq::Error::Status(status, resp) if status >= 500 => {
            AppError::new(CODE_UNAVAILABLE, "Provider is unavailable")
                .with_details(format!("op={operation}; status={status}; body={}", body_excerpt(resp)))
                .with_retryable(true)
        }
        ureq::Error::Status(status, resp) => AppError::new(CODE_REJECTED, "Provider rejected the request")
            .with_details(format!("op={operation}; status={status}; body={}", body_excerpt(resp))),
        ureq::Error::Transport(t) => AppError::new(CODE_UNAVAILABLE, "Failed to reach provider")
            .with_details(format!("op={operation}; err={t}"))
            .with_retryable(true),
    }
}

fn body_excerpt(resp: ureq::Response) -> String {
    let body = resp.into_string().unwrap_or_default();
    body.chars().take(300).collect()
}
