mod common;

use std::cell::Cell;
use std::time::Duration;

use common::{chunk, security_embedder, FlakyEmbedder, KeywordEmbedder, RecordingPause, MODEL};
use docqa_ai::embeddings::Embedder;
use docqa_ai::evidence::{EvidenceStore, IngestPacing};
use docqa_core::domain::Chunk;
use docqa_core::error::{AppError, CODE_RATE_LIMITED, CODE_REJECTED, CODE_UNAVAILABLE};
use pretty_assertions::assert_eq;

fn five_chunks() -> Vec<Chunk> {
    (0..5)
        .map(|i| chunk("manual.txt", 1, i * 100, &format!("section {i} about ransomware")))
        .collect()
}

fn pacing(batch_size: usize, delay_ms: u64, max_retries: u32) -> IngestPacing {
    IngestPacing {
        batch_size,
        batch_delay: Duration::from_millis(delay_ms),
        max_retries,
    }
}

#[test]
fn five_chunks_in_batches_of_two_pause_between_batches() {
    let embedder = security_embedder();
    let pause = RecordingPause::default();
    let mut store = EvidenceStore::new(MODEL);

    let report = store
        .index(&embedder, &five_chunks(), &pacing(2, 1000, 3), &pause)
        .expect("index");

    assert_eq!(*embedder.batch_sizes.borrow(), vec![2, 2, 1]);
    assert_eq!(
        *pause.waits.borrow(),
        vec![Duration::from_secs(1), Duration::from_secs(1)]
    );
    assert_eq!(report.batches, 3);
    assert_eq!(report.embedded, 5);
    assert_eq!(report.skipped, 0);
    assert_eq!(store.len(), 5);
}

#[test]
fn rate_limited_batch_is_retried_with_backoff() {
    let rate_limited = AppError::new(CODE_RATE_LIMITED, "slow down").with_retryable(true);
    let embedder = FlakyEmbedder::new(security_embedder(), 2, rate_limited);
    let pause = RecordingPause::default();
    let mut store = EvidenceStore::new(MODEL);

    let chunks: Vec<Chunk> = five_chunks().into_iter().take(2).collect();
    let report = store
        .index(&embedder, &chunks, &pacing(2, 1000, 3), &pause)
        .expect("index");

    assert_eq!(
        *pause.waits.borrow(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(report.retries, 2);
    assert_eq!(report.embedded, 2);
    assert_eq!(store.len(), 2);
}

#[test]
fn rate_limit_exhaustion_aborts_ingestion() {
    let rate_limited = AppError::new(CODE_RATE_LIMITED, "slow down").with_retryable(true);
    let embedder = FlakyEmbedder::new(security_embedder(), u32::MAX, rate_limited);
    let pause = RecordingPause::default();
    let mut store = EvidenceStore::new(MODEL);

    let err = store
        .index(&embedder, &five_chunks(), &pacing(2, 1000, 2), &pause)
        .expect_err("should abort");

    assert_eq!(err.code, CODE_RATE_LIMITED);
    assert_eq!(
        *pause.waits.borrow(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert!(store.is_empty());
}

#[test]
fn rejected_batch_is_skipped_and_counted() {
    let rejected = AppError::new(CODE_REJECTED, "bad input");
    let embedder = FlakyEmbedder::new(security_embedder(), 1, rejected);
    let pause = RecordingPause::default();
    let mut store = EvidenceStore::new(MODEL);

    let chunks: Vec<Chunk> = five_chunks().into_iter().take(4).collect();
    let report = store
        .index(&embedder, &chunks, &pacing(2, 0, 3), &pause)
        .expect("index");

    assert_eq!(report.skipped, 2);
    assert_eq!(report.embedded, 2);
    assert_eq!(report.retries, 0);
    assert_eq!(store.len(), 2);
    assert!(store.get(&chunks[0].id).is_none());
    assert!(store.get(&chunks[3].id).is_some());
}

/// Drops the last vector of the first batch it is asked for.
struct ShortEmbedder {
    inner: KeywordEmbedder,
    truncated: Cell<bool>,
}

impl Embedder for ShortEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.inner.embed(model, input)
    }

    fn embed_batch(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut vectors = self.inner.embed_batch(model, inputs)?;
        if !self.truncated.replace(true) {
            vectors.pop();
        }
        Ok(vectors)
    }
}

#[test]
fn short_vector_batch_is_skipped_and_counted() {
    let embedder = ShortEmbedder {
        inner: security_embedder(),
        truncated: Cell::new(false),
    };
    let pause = RecordingPause::default();
    let mut store = EvidenceStore::new(MODEL);

    let chunks: Vec<Chunk> = five_chunks().into_iter().take(4).collect();
    let report = store
        .index(&embedder, &chunks, &pacing(2, 0, 3), &pause)
        .expect("index");

    assert_eq!(report.batches, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.embedded, 2);
    assert_eq!(store.len(), 2);
    assert!(store.get(&chunks[1].id).is_none());
    assert!(store.get(&chunks[2].id).is_some());
}

#[test]
fn unavailable_provider_aborts_without_retry() {
    let down = AppError::new(CODE_UNAVAILABLE, "connection refused").with_retryable(true);
    let embedder = FlakyEmbedder::new(security_embedder(), 1, down);
    let pause = RecordingPause::default();
    let mut store = EvidenceStore::new(MODEL);

    let err = store
        .index(&embedder, &five_chunks(), &pacing(2, 1000, 3), &pause)
        .expect_err("should abort");
    assert_eq!(err.code, CODE_UNAVAILABLE);
    assert!(pause.waits.borrow().is_empty());
    assert!(store.is_empty());
}

#[test]
fn dimension_mismatch_fails_the_build() {
    let mut store = EvidenceStore::new(MODEL);
    let pause = RecordingPause::default();
    store
        .index(&KeywordEmbedder::new(&["a"]), &[chunk("x.txt", 1, 0, "a")], &pacing(2, 0, 0), &pause)
        .expect("first");

    let err = store
        .index(&KeywordEmbedder::new(&["a", "b"]), &[chunk("x.txt", 1, 50, "b")], &pacing(2, 0, 0), &pause)
        .expect_err("mismatch");
    assert_eq!(err.code, "AI_INDEX_BUILD_FAILED");
}

#[test]
fn backoff_doubles_from_a_floor() {
    let slow = pacing(2, 1000, 3);
    assert_eq!(slow.backoff(0), Duration::from_secs(1));
    assert_eq!(slow.backoff(1), Duration::from_secs(2));
    assert_eq!(slow.backoff(2), Duration::from_secs(4));

    let fast = pacing(2, 100, 3);
    assert_eq!(fast.backoff(0), Duration::from_millis(500));
    assert_eq!(fast.backoff(1), Duration::from_secs(1));
}

#[test]
fn default_pacing_matches_provider_limits() {
    assert_eq!(IngestPacing::default(), pacing(2, 1000, 3));
}
