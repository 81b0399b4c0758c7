//! In-process embedding cache keyed by `(embedder_id, content_hash)`.
//!
//! The cache is consulted before calling the wrapped embedder and written
//! through on misses, so rebuilding an index over an unchanged corpus only
//! embeds new or edited passages. Misses are embedded in one batch.
//! Query embeddings read the cache but never fill it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Result};
use sagevault_core::traits::Embedder;
use tracing::debug;

pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    entries: Mutex<HashMap<String, Vec<f32>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self { inner, entries: Mutex::new(HashMap::new()), hits: AtomicUsize::new(0), misses: AtomicUsize::new(0) }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner).len();
        CacheStats { hits: self.hits.load(Ordering::Relaxed), misses: self.misses.load(Ordering::Relaxed), entries }
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn key(&self, text: &str) -> String {
        format!("{}:{}", self.inner.id(), content_hash(text))
    }
}

impl Embedder for CachedEmbedder {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| self.key(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            keys.iter().map(|k| entries.get(k).cloned()).collect()
        };

        // Each distinct missing text is embedded once, outside the lock.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut miss_keys: Vec<&str> = Vec::new();
        let mut miss_texts: Vec<String> = Vec::new();
        for (i, slot) in out.iter().enumerate() {
            if slot.is_none() && seen.insert(keys[i].as_str()) {
                miss_keys.push(&keys[i]);
                miss_texts.push(texts[i].clone());
            }
        }
        self.hits.fetch_add(texts.len() - out.iter().filter(|s| s.is_none()).count(), Ordering::Relaxed);
        self.misses.fetch_add(miss_texts.len(), Ordering::Relaxed);

        if !miss_texts.is_empty() {
            let fresh = self.inner.embed_batch(&miss_texts)?;
            if fresh.len() != miss_texts.len() {
                bail!("embedder '{}' returned {} vectors for {} texts", self.inner.id(), fresh.len(), miss_texts.len());
            }
            let fresh: HashMap<&str, Vec<f32>> = miss_keys.iter().copied().zip(fresh).collect();
            for (slot, key) in out.iter_mut().zip(&keys) {
                if slot.is_none() {
                    *slot = fresh.get(key.as_str()).cloned();
                }
            }
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for (key, vector) in fresh {
                entries.insert(key.to_string(), vector);
            }
            debug!(embedded = miss_texts.len(), cached = entries.len(), "embedding cache filled");
        }

        out.into_iter()
            .map(|slot| slot.ok_or_else(|| anyhow::anyhow!("embedding missing after cache fill")))
            .collect()
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let cached = self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(&self.key(text)).cloned();
        if let Some(vector) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(vector);
        }
        self.inner.embed_query(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashingEmbedder;

    #[test]
    fn repeated_texts_hit_the_cache() {
        let cache = CachedEmbedder::new(Arc::new(HashingEmbedder::new(32)));
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let first = cache.embed_batch(&texts).unwrap();
        assert_eq!(first[0], first[2]);
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 2, entries: 2 });

        let second = cache.embed_batch(&texts[..2]).unwrap();
        assert_eq!(second[1], first[1]);
        assert_eq!(cache.stats().hits, 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn large_batch_of_distinct_texts_embeds_each_once() {
        let cache = CachedEmbedder::new(Arc::new(HashingEmbedder::new(8)));
        let mut texts: Vec<String> = (0..20_000).map(|i| format!("passage number {i}")).collect();
        texts.extend(texts[..500].to_vec());
        let vectors = cache.embed_batch(&texts).unwrap();
        assert_eq!(vectors.len(), 20_500);
        assert_eq!(vectors[20_000], vectors[0]);
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 20_000, entries: 20_000 });
    }

    #[test]
    fn queries_do_not_grow_the_cache() {
        let cache = CachedEmbedder::new(Arc::new(HashingEmbedder::new(16)));
        let stored = cache.embed_batch(&["indexed passage".to_string()]).unwrap();
        for i in 0..100 {
            cache.embed_query(&format!("question {i}")).unwrap();
        }
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.embed_query("indexed passage").unwrap(), stored[0]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn hash_is_stable_hex() {
        assert_eq!(content_hash("x"), content_hash("x"));
        assert_eq!(content_hash("x").len(), 64);
    }
}
