use std::collections::HashMap;

use sagevault_core::traits::VectorIndexer;
use sagevault_core::types::{ChunkId, IndexedPassage};
use sagevault_embed::cosine_similarity;

/// Exhaustive in-memory cosine index.
///
/// Passages keep their insertion order; an upsert with a known chunk id
/// replaces the passage in place, so ids stay unique.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    passages: Vec<IndexedPassage>,
    positions: HashMap<ChunkId, usize>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_passages(passages: Vec<IndexedPassage>) -> Self {
        let mut index = Self::new();
        index.upsert(passages);
        index
    }

    pub fn passages(&self) -> &[IndexedPassage] {
        &self.passages
    }

    pub fn get(&self, id: &str) -> Option<&IndexedPassage> {
        self.positions.get(id).map(|&i| &self.passages[i])
    }
}

impl VectorIndexer for FlatIndex {
    fn upsert(&mut self, passages: Vec<IndexedPassage>) {
        for passage in passages {
            if let Some(&i) = self.positions.get(&passage.chunk.id) {
                self.passages[i] = passage;
            } else {
                self.positions.insert(passage.chunk.id.clone(), self.passages.len());
                self.passages.push(passage);
            }
        }
    }

    fn search_vec(&self, query_vec: &[f32], k: usize) -> Vec<(&IndexedPassage, f32)> {
        if k == 0 || self.passages.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(i, p)| (i, cosine_similarity(query_vec, &p.embedding)))
            .collect();
        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored.into_iter().map(|(i, score)| (&self.passages[i], score)).collect()
    }

    fn clear(&mut self) {
        self.passages.clear();
        self.positions.clear();
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sagevault_core::types::{Chunk, SourceType};

    fn passage(key: &str, ordinal: usize, embedding: Vec<f32>) -> IndexedPassage {
        IndexedPassage::new(Chunk::new(key, ordinal, format!("{key} {ordinal}")), embedding, &SourceType::Repository)
    }

    #[test]
    fn upsert_replaces_same_id() {
        let mut index = FlatIndex::new();
        index.upsert(vec![passage("a.md", 0, vec![1.0, 0.0]), passage("b.md", 0, vec![0.0, 1.0])]);
        index.upsert(vec![passage("a.md", 0, vec![0.0, 1.0])]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a.md::0").map(|p| p.embedding.clone()), Some(vec![0.0, 1.0]));
    }

    #[test]
    fn search_orders_by_similarity_and_keeps_ties_stable() {
        let index = FlatIndex::from_passages(vec![
            passage("a.md", 0, vec![0.0, 1.0]),
            passage("b.md", 0, vec![1.0, 0.0]),
            passage("c.md", 0, vec![1.0, 0.0]),
        ]);
        let hits = index.search_vec(&[1.0, 0.0], 2);
        let ids: Vec<&str> = hits.iter().map(|(p, _)| p.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["b.md::0", "c.md::0"]);
        assert!(hits.iter().all(|(_, s)| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn empty_index_and_zero_k_return_nothing() {
        let mut index = FlatIndex::new();
        assert!(index.search_vec(&[1.0], 3).is_empty());
        index.upsert(vec![passage("a.md", 0, vec![1.0])]);
        assert!(index.search_vec(&[1.0], 0).is_empty());
        index.clear();
        assert!(index.is_empty());
    }
}
