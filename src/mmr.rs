//! Maximal marginal relevance re-ranking.
//!
//! MMR re-orders an over-fetched candidate set by trading relevance to the
//! query against diversity among the already-selected candidates. The store
//! runs it client-side over the vectors returned with the initial fetch, so
//! no second round-trip to the engine is needed.

use crate::error::{RemoraError, Result};

/// Cosine similarity between two vectors of equal dimension.
///
/// Zero vectors have similarity 0.0 to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RemoraError::invalid_argument(format!(
            "vector dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        Ok(0.0)
    } else {
        Ok(dot / (norm_a * norm_b))
    }
}

/// Greedily select up to `k` candidate indices by maximal marginal relevance.
///
/// At each step the remaining candidate maximizing
/// `lambda_mult * rel(c, query) - (1 - lambda_mult) * max_sim(c, selected)`
/// is taken, with cosine similarity for both terms. The first selection has
/// no prior picks and reduces to pure relevance. Ties break toward the
/// earlier candidate, so the ordering is stable; `lambda_mult = 1.0`
/// reproduces plain relevance order and `lambda_mult = 0.0` maximizes
/// diversity. Fewer candidates than `k` yields a shorter result, not an
/// error.
///
/// Returns indices into `candidates`, in selection order.
pub fn maximal_marginal_relevance(
    query_vector: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    lambda_mult: f32,
) -> Result<Vec<usize>> {
    let effective_k = k.min(candidates.len());
    if effective_k == 0 {
        return Ok(Vec::new());
    }

    let mut relevance = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        relevance.push(cosine_similarity(query_vector, candidate)?);
    }

    // First pick: pure relevance, earliest index wins ties.
    let mut best_idx = 0;
    for (idx, &rel) in relevance.iter().enumerate().skip(1) {
        if rel > relevance[best_idx] {
            best_idx = idx;
        }
    }
    let mut selected = vec![best_idx];

    while selected.len() < effective_k {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_idx = None;

        for (idx, &rel) in relevance.iter().enumerate() {
            if selected.contains(&idx) {
                continue;
            }

            let mut max_sim = f32::NEG_INFINITY;
            for &chosen in &selected {
                let sim = cosine_similarity(&candidates[idx], &candidates[chosen])?;
                max_sim = max_sim.max(sim);
            }

            let score = lambda_mult * rel - (1.0 - lambda_mult) * max_sim;
            if score > best_score {
                best_score = score;
                best_idx = Some(idx);
            }
        }

        match best_idx {
            Some(idx) => selected.push(idx),
            None => break,
        }
    }

    Ok(selected)
}
