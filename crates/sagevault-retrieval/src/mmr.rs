//! Maximal Marginal Relevance re-ranking.
//!
//! MMR = λ × relevance(doc) - (1-λ) × max(similarity(doc, selected))
//!
//! λ = 1.0: pure relevance
//! λ = 0.0: pure novelty
//!
//! Relevance is the candidate's retrieval similarity to the query; redundancy
//! is the cosine similarity of stored passage embeddings.

use sagevault_core::types::Candidate;
use sagevault_embed::cosine_similarity;

pub const DEFAULT_LAMBDA: f32 = 0.7;

/// Selects `min(k, candidates.len())` candidates in MMR order.
///
/// The most similar candidate is always picked first. Ties at every step go
/// to the candidate that came earlier in the input.
pub fn select_diverse(candidates: Vec<Candidate>, k: usize, lambda: f32) -> Vec<Candidate> {
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }
    if candidates.len() == 1 {
        return candidates;
    }
    let lambda = if lambda.is_nan() { DEFAULT_LAMBDA } else { lambda.clamp(0.0, 1.0) };
    let k = k.min(candidates.len());

    let mut taken = vec![false; candidates.len()];
    // Highest similarity of each candidate to anything selected so far.
    let mut redundancy = vec![0f32; candidates.len()];
    let mut order: Vec<usize> = Vec::with_capacity(k);

    for step in 0..k {
        let mut best: Option<(usize, f32)> = None;
        for (i, c) in candidates.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let score = if step == 0 { c.similarity } else { lambda * c.similarity - (1.0 - lambda) * redundancy[i] };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        let Some((chosen, _)) = best else { break };
        taken[chosen] = true;
        order.push(chosen);
        for (i, c) in candidates.iter().enumerate() {
            if !taken[i] {
                let sim = cosine_similarity(&c.embedding, &candidates[chosen].embedding);
                redundancy[i] = redundancy[i].max(sim);
            }
        }
    }

    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sagevault_core::types::Meta;

    fn cand(id: &str, similarity: f32, embedding: Vec<f32>) -> Candidate {
        Candidate {
            id: id.to_string(),
            source_key: id.to_string(),
            text: id.to_string(),
            similarity,
            metadata: Meta::new(),
            embedding,
        }
    }

    fn ids(v: &[Candidate]) -> Vec<&str> {
        v.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn near_duplicate_is_pushed_down() {
        let pool = vec![
            cand("a", 0.9, vec![1.0, 0.0]),
            cand("a-copy", 0.88, vec![1.0, 0.0]),
            cand("b", 0.7, vec![0.0, 1.0]),
        ];
        let out = select_diverse(pool, 2, 0.5);
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    #[test]
    fn lambda_one_is_plain_relevance() {
        let pool = vec![
            cand("a", 0.9, vec![1.0, 0.0]),
            cand("a-copy", 0.88, vec![1.0, 0.0]),
            cand("b", 0.7, vec![0.0, 1.0]),
        ];
        assert_eq!(ids(&select_diverse(pool, 3, 1.0)), vec!["a", "a-copy", "b"]);
    }

    #[test]
    fn ties_prefer_earlier_candidates() {
        let pool = vec![cand("x", 0.5, vec![1.0]), cand("y", 0.5, vec![1.0]), cand("z", 0.5, vec![1.0])];
        assert_eq!(ids(&select_diverse(pool, 3, 0.7)), vec!["x", "y", "z"]);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(select_diverse(Vec::new(), 3, 0.7).is_empty());
        assert!(select_diverse(vec![cand("a", 0.1, vec![])], 0, 0.7).is_empty());
        assert_eq!(ids(&select_diverse(vec![cand("a", 0.1, vec![])], 5, 0.7)), vec!["a"]);
    }

    proptest! {
        #[test]
        fn size_and_top_hit(
            sims in proptest::collection::vec(0.0f32..=1.0, 1..20),
            k in 1usize..25,
            lambda in 0.0f32..=1.0,
        ) {
            let pool: Vec<Candidate> = sims
                .iter()
                .enumerate()
                .map(|(i, &s)| cand(&format!("c{i}"), s, vec![s, 1.0 - s, (i % 3) as f32]))
                .collect();
            let top = pool
                .iter()
                .fold(None::<&Candidate>, |best, c| match best {
                    Some(b) if b.similarity >= c.similarity => Some(b),
                    _ => Some(c),
                })
                .map(|c| c.id.clone());
            let out = select_diverse(pool.clone(), k, lambda);
            prop_assert_eq!(out.len(), k.min(pool.len()));
            prop_assert_eq!(out.first().map(|c| c.id.clone()), top);
        }
    }
}
