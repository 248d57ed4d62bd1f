use docqa_core::domain::{Chunk, ScoredChunk};

pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.75;

/// Keep chunks scoring strictly above `threshold`, in their original order.
///
/// A score equal to the threshold is excluded, and NaN never passes. An empty
/// result means nothing is relevant enough to put in front of the model.
pub fn filter(results: &[ScoredChunk], threshold: f32) -> Vec<Chunk> {
    results
        .iter()
        .filter(|r| r.score > threshold)
        .map(|r| r.chunk.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(id, None, None, format!("text of {id}")),
            score,
        }
    }

    #[test]
    fn keeps_strictly_greater_in_order() {
        let results = vec![scored("a", 0.91), scored("b", 0.80), scored("c", 0.60)];
        let kept = filter(&results, 0.75);
        let texts: Vec<&str> = kept.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["text of a", "text of b"]);
    }

    #[test]
    fn score_equal_to_threshold_is_excluded() {
        let results = vec![scored("a", 0.75), scored("b", 0.7500001)];
        let kept = filter(&results, 0.75);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "text of b");
    }

    #[test]
    fn nan_and_empty_inputs_yield_nothing() {
        assert!(filter(&[scored("a", f32::NAN)], 0.0).is_empty());
        assert!(filter(&[], 0.75).is_empty());
    }

    #[test]
    fn matches_reference_subset_for_many_thresholds() {
        let scores = [0.95, -0.2, 0.5, 0.5, 1.3, 0.0, 0.74, 0.76];
        let results: Vec<ScoredChunk> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| scored(&format!("c{i}"), *s))
            .collect();
        for t in [-1.0f32, -0.2, 0.0, 0.25, 0.5, 0.75, 0.95, 1.3, 2.0] {
            let expected: Vec<String> = results
                .iter()
                .filter(|r| r.score > t)
                .map(|r| r.chunk.id.clone())
                .collect();
            let got: Vec<String> = filter(&results, t).into_iter().map(|c| c.id).collect();
            assert_eq!(got, expected, "threshold {t}");
        }
    }
}
