use std::cmp::Ordering;

use docqa_core::error::AppError;

pub mod similarity;

/// Exact cosine top-k over `(id, vector)` candidates.
///
/// Ordered by descending score, ties by id ascending. Zero-norm candidates are
/// skipped; a zero-norm query is an error.
pub fn top_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Result<Vec<(String, f32)>, AppError>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let qnorm = similarity::l2_norm(query);
    if qnorm == 0.0 || !qnorm.is_finite() {
        return Err(AppError::new(
            "AI_RETRIEVAL_FAILED",
            "Query embedding norm is zero",
        ));
    }

    let mut hits: Vec<(String, f32)> = Vec::new();
    for (id, v) in candidates {
        if v.len() != query.len() {
            return Err(AppError::new("AI_RETRIEVAL_FAILED", "Index vector dims mismatch")
                .with_details(format!("chunk_id={id}; expected={}; got={}", query.len(), v.len())));
        }
        let vnorm = similarity::l2_norm(v);
        if vnorm == 0.0 {
            continue;
        }
        hits.push((id.to_string(), similarity::cosine_similarity(query, v, qnorm, vnorm)));
    }

    hits.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    hits.truncate(k);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_by_score_then_id() {
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0];
        let c = [1.0f32, 0.0];
        let zero = [0.0f32, 0.0];
        let hits = top_k(
            &[1.0, 0.1],
            vec![("c", &c[..]), ("b", &b[..]), ("a", &a[..]), ("z", &zero[..])],
            3,
        )
        .expect("rank");
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(hits[0].1 > hits[2].1);
    }

    #[test]
    fn zero_query_is_rejected() {
        let a = [1.0f32];
        assert!(top_k(&[0.0], vec![("a", &a[..])], 1).is_err());
    }
}
