use std::cmp::Ordering;

use tracing::debug;

use sagevault_core::config::{RetrievalConfig, MAX_IMPORTANT_BOOST};
use sagevault_core::error::Result;
use sagevault_core::types::{
    clamp_unit, Candidate, Document, Meta, META_ORDINAL, META_SOURCE_KEY, META_SOURCE_TYPE, UPLOADED_PREFIX,
};
use sagevault_index::EmbeddingIndex;

/// Optional per-query context for the retriever.
#[derive(Debug, Clone, Default)]
pub struct RetrieveContext {
    /// A privileged passage (e.g. the project overview) forced into the pool.
    pub pinned: Option<Document>,
    /// Directory or file-name tokens appended to the query text for recall.
    pub hints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Retriever {
    fetch_multiplier: usize,
    fetch_hard_cap: usize,
    important_patterns: Vec<String>,
    important_boost: f32,
    pinned_max_chars: usize,
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new(&RetrievalConfig::default())
    }
}

impl Retriever {
    pub fn new(config: &RetrievalConfig) -> Self {
        let boost = if config.important_boost.is_nan() { 1.0 } else { config.important_boost };
        Self {
            fetch_multiplier: config.fetch_multiplier.max(1),
            fetch_hard_cap: config.fetch_hard_cap.max(1),
            important_patterns: config.important_patterns.iter().map(|p| p.to_lowercase()).collect(),
            important_boost: boost.clamp(1.0, MAX_IMPORTANT_BOOST),
            pinned_max_chars: config.pinned_max_chars.max(1),
        }
    }

    /// Size of the raw neighbour pool requested for `k` final results.
    pub fn fetch_size(&self, k: usize) -> usize {
        k.saturating_mul(self.fetch_multiplier).min(self.fetch_hard_cap)
    }

    /// Embeds `query` (plus any hint tokens) and builds the candidate pool.
    pub fn retrieve(
        &self,
        query: &str,
        index: &EmbeddingIndex,
        k: usize,
        ctx: &RetrieveContext,
    ) -> Result<Vec<Candidate>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let text = if ctx.hints.is_empty() { query.to_string() } else { format!("{query} {}", ctx.hints.join(" ")) };
        let query_vec = index.embed_query(&text)?;
        self.retrieve_with_embedding(&query_vec, index, k, ctx)
    }

    pub fn retrieve_with_embedding(
        &self,
        query_vec: &[f32],
        index: &EmbeddingIndex,
        k: usize,
        ctx: &RetrieveContext,
    ) -> Result<Vec<Candidate>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let fetch = self.fetch_size(k);
        let mut pool = index.search_vec(query_vec, fetch);
        let retrieved = pool.len();

        for c in &mut pool {
            if self.is_important(&c.source_key) {
                c.similarity = clamp_unit(c.similarity * self.important_boost);
            }
        }
        pool.sort_by(|a, b| self.rank(a, b));

        if let Some(doc) = &ctx.pinned {
            if !doc.text.trim().is_empty() && !pool.iter().any(|c| c.source_key == doc.key) {
                let pinned = self.pinned_candidate(doc, index)?;
                if pool.len() >= fetch {
                    pool.pop();
                }
                pool.insert(0, pinned);
            }
        }
        debug!(fetch, retrieved, pool = pool.len(), "retrieved candidate pool");
        Ok(pool)
    }

    pub fn is_important(&self, source_key: &str) -> bool {
        let key = source_key.to_lowercase();
        self.important_patterns.iter().any(|p| !p.is_empty() && key.contains(p.as_str()))
    }

    /// Similarity desc, then important documents, then shallower keys. `sort_by`
    /// is stable, so remaining ties keep retrieval order.
    fn rank(&self, a: &Candidate, b: &Candidate) -> Ordering {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| self.is_important(&b.source_key).cmp(&self.is_important(&a.source_key)))
            .then_with(|| path_depth(&a.source_key).cmp(&path_depth(&b.source_key)))
    }

    fn pinned_candidate(&self, doc: &Document, index: &EmbeddingIndex) -> Result<Candidate> {
        let text: String = doc.text.trim().chars().take(self.pinned_max_chars).collect();
        let embedding = index.embed_query(&text)?;
        let mut metadata = Meta::new();
        metadata.insert(META_SOURCE_KEY.to_string(), doc.key.clone());
        metadata.insert(META_ORDINAL.to_string(), "0".to_string());
        metadata.insert(META_SOURCE_TYPE.to_string(), doc.source_type().as_str().to_string());
        metadata.insert("pinned".to_string(), "true".to_string());
        Ok(Candidate {
            id: format!("{}::pinned", doc.key),
            source_key: doc.key.clone(),
            text,
            similarity: 1.0,
            metadata,
            embedding,
        })
    }
}

/// Number of directory levels above the file; uploads count as top level.
pub fn path_depth(source_key: &str) -> usize {
    source_key.strip_prefix(UPLOADED_PREFIX).unwrap_or(source_key).matches('/').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    use sagevault_core::types::Chunk;
    use sagevault_embed::FnEmbedder;

    /// Every text embeds to the same vector, so every passage ties on similarity.
    fn flat_index(keys: &[&str]) -> EmbeddingIndex {
        let embedder = FnEmbedder::new("flat", 2, |texts: &[String]| -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 1.0]).collect())
        });
        let index = EmbeddingIndex::new("t", Arc::new(embedder));
        let chunks: Vec<Chunk> = keys.iter().map(|k| Chunk::new(k, 0, format!("text of {k}"))).collect();
        index.upsert(&chunks).expect("upsert");
        index
    }

    fn keys(pool: &[Candidate]) -> Vec<&str> {
        pool.iter().map(|c| c.source_key.as_str()).collect()
    }

    #[test]
    fn fetch_size_is_capped() {
        let r = Retriever::default();
        assert_eq!(r.fetch_size(5), 15);
        assert_eq!(r.fetch_size(40), 50);
    }

    #[test]
    fn ties_prefer_important_then_shallow_then_order() {
        let index = flat_index(&["src/deep/a.rs", "docs/b.md", "docs/README.md", "c.md"]);
        let pool = Retriever::default().retrieve("anything", &index, 5, &RetrieveContext::default()).unwrap();
        assert_eq!(keys(&pool), vec!["docs/README.md", "c.md", "docs/b.md", "src/deep/a.rs"]);
    }

    #[test]
    fn pinned_document_is_prepended_and_displaces_last() {
        let index = flat_index(&["a.md", "b.md", "c.md"]);
        let cfg = RetrievalConfig { fetch_multiplier: 1, ..RetrievalConfig::default() };
        let ctx = RetrieveContext { pinned: Some(Document::new("OVERVIEW.txt", "The overview.")), hints: Vec::new() };
        let pool = Retriever::new(&cfg).retrieve("q", &index, 3, &ctx).unwrap();
        assert_eq!(keys(&pool), vec!["OVERVIEW.txt", "a.md", "b.md"]);
        assert_eq!(pool[0].similarity, 1.0);
    }

    #[test]
    fn pinned_document_already_present_is_not_duplicated() {
        let index = flat_index(&["README.md", "b.md"]);
        let ctx = RetrieveContext { pinned: Some(Document::new("README.md", "readme")), hints: Vec::new() };
        let pool = Retriever::default().retrieve("q", &index, 2, &ctx).unwrap();
        assert_eq!(keys(&pool), vec!["README.md", "b.md"]);
    }

    #[test]
    fn boost_is_bounded() {
        let cfg = RetrievalConfig { important_boost: 10.0, ..RetrievalConfig::default() };
        assert_eq!(Retriever::new(&cfg).important_boost, MAX_IMPORTANT_BOOST);
    }

    #[test]
    fn depth_ignores_upload_prefix() {
        assert_eq!(path_depth("uploaded:notes.txt"), 0);
        assert_eq!(path_depth("a/b/c.rs"), 2);
    }
}
