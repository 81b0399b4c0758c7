use std::hash::{Hash, Hasher};

use sagevault_core::traits::Embedder;
use twox_hash::XxHash64;

use crate::math::l2_normalize;
use crate::tokenize::{char_ngrams, words};

const WORD_WEIGHT: f32 = 1.0;
const NGRAM_WEIGHT: f32 = 0.35;
const NGRAM_SIZE: usize = 3;

/// Deterministic feature-hashing embedder.
///
/// Words and their character trigrams are hashed into `dim` buckets with
/// non-negative weights, so cosine similarity between any two outputs is in
/// `[0, 1]` and texts sharing vocabulary score above zero.
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hashing:xxh64:d{dim}") }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for word in words(text) {
            v[self.bucket(&word, 0)] += WORD_WEIGHT;
            for gram in char_ngrams(&word, NGRAM_SIZE) {
                v[self.bucket(&gram, 1)] += NGRAM_WEIGHT;
            }
        }
        l2_normalize(&mut v);
        v
    }

    fn bucket(&self, feature: &str, seed: u64) -> usize {
        let mut hasher = XxHash64::with_seed(seed);
        feature.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let idx = (hasher.finish() % self.dim as u64) as usize;
        idx
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::cosine_similarity;

    #[test]
    fn related_texts_score_higher_than_unrelated() {
        let e = HashingEmbedder::new(256);
        let q = e.embed_text("install the project");
        let related = e.embed_text("Run pip install to install the project dependencies.");
        let unrelated = e.embed_text("Quarterly revenue grew in the northern region.");
        assert!(cosine_similarity(&q, &related) > cosine_similarity(&q, &unrelated));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed_text("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn zero_dim_is_clamped() {
        assert_eq!(HashingEmbedder::new(0).dim(), 1);
    }
}
