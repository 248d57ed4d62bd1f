use std::time::Duration;

use docqa_core::config::RagConfig;

const MIN_BACKOFF: Duration = Duration::from_millis(500);

/// Blocking wait between provider calls. Swappable so tests can record instead of sleep.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Backpressure for ingestion: batch size, the pause between batches, and how
/// many times a rate-limited batch is retried before the error surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestPacing {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub max_retries: u32,
}

impl IngestPacing {
    pub fn from_config(cfg: &RagConfig) -> Self {
        Self {
            batch_size: cfg.ingest_batch_size.max(1),
            batch_delay: cfg.ingest_batch_delay,
            max_retries: cfg.ingest_max_retries,
        }
    }

    /// Wait before retry number `attempt` (0-based): doubles each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.batch_delay.max(MIN_BACKOFF);
        base.saturating_mul(1u32 << attempt.min(6))
    }
}

impl Default for IngestPacing {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_delay: Duration::from_secs(1),
            max_retries: 3,
        }
    }
}
