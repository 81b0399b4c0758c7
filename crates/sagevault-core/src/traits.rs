use crate::types::{Document, IndexedPassage};

/// The embedding function the pipeline is built around.
///
/// Implementations must be deterministic for identical input and return
/// L2-normalised vectors of exactly `dim()` components.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model, used to key caches and snapshots.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embeds one query-time text. Implementations holding state (e.g. caches)
    /// must not retain anything per query.
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors.pop().ok_or_else(|| anyhow::anyhow!("embedder '{}' returned no vector", self.id()))
    }
}

/// Storage and nearest-neighbour search over embedded passages.
pub trait VectorIndexer: Send + Sync {
    /// Inserts passages, replacing any existing passage with the same chunk id.
    fn upsert(&mut self, passages: Vec<IndexedPassage>);
    /// Returns up to `k` passages ordered by descending similarity in `[0, 1]`.
    fn search_vec(&self, query_vec: &[f32], k: usize) -> Vec<(&IndexedPassage, f32)>;
    fn clear(&mut self);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Supplies at most one privileged passage per corpus, e.g. the project overview.
pub trait PinLookup: Send + Sync {
    fn pinned<'a>(&self, corpus: &'a [Document]) -> Option<&'a Document>;
}
