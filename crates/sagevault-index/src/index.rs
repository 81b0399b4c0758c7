use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sagevault_core::error::{Error, Result};
use sagevault_core::traits::{Embedder, VectorIndexer};
use sagevault_core::types::{Candidate, Chunk, IndexedPassage, SourceType};
use tracing::{debug, info};

use crate::flat::FlatIndex;

/// A named embedding index over one logical corpus.
///
/// Queries take a read lock; `upsert`, `rebuild` and `clear` take the write
/// lock, so a query never observes a half-rebuilt index. All embedding happens
/// before the lock is taken and a failed embed leaves the stored passages
/// untouched.
pub struct EmbeddingIndex {
    name: String,
    embedder: Arc<dyn Embedder>,
    store: RwLock<FlatIndex>,
}

impl EmbeddingIndex {
    pub fn new(name: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self { name: name.into(), embedder, store: RwLock::new(FlatIndex::new()) }
    }

    pub(crate) fn with_store(name: String, embedder: Arc<dyn Embedder>, store: FlatIndex) -> Self {
        Self { name, embedder, store: RwLock::new(store) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn dim(&self) -> usize {
        self.embedder.dim()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Embeds and inserts `chunks`, replacing passages with the same id.
    /// Returns the number of passages written.
    pub fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let passages = self.embed_chunks(chunks)?;
        let written = passages.len();
        let mut store = self.write();
        store.upsert(passages);
        info!(index = %self.name, written, total = store.len(), "upserted passages");
        Ok(written)
    }

    /// Replaces every stored passage with `chunks` in one swap.
    pub fn rebuild(&self, chunks: &[Chunk]) -> Result<usize> {
        let passages = if chunks.is_empty() { Vec::new() } else { self.embed_chunks(chunks)? };
        let fresh = FlatIndex::from_passages(passages);
        let total = fresh.len();
        *self.write() = fresh;
        info!(index = %self.name, total, "rebuilt index");
        Ok(total)
    }

    pub fn clear(&self) {
        self.write().clear();
        debug!(index = %self.name, "cleared index");
    }

    /// Embeds query-time text. Nothing about the query is retained.
    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.embed_query(text).map_err(Error::retrieval)?;
        let expected = self.embedder.dim();
        if vector.len() != expected {
            return Err(Error::retrieval(Error::DimensionMismatch { expected, got: vector.len() }));
        }
        Ok(vector)
    }

    /// The `k` nearest chunks to `text` with their similarity in `[0, 1]`.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<(Chunk, f32)>> {
        Ok(self.search(text, k)?.into_iter().map(candidate_chunk).collect())
    }

    /// Like `query`, but returns candidates carrying metadata and stored embeddings.
    pub fn search(&self, text: &str, k: usize) -> Result<Vec<Candidate>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_query(text)?;
        Ok(self.search_vec(&query_vec, k))
    }

    pub fn search_vec(&self, query_vec: &[f32], k: usize) -> Vec<Candidate> {
        self.read()
            .search_vec(query_vec, k)
            .into_iter()
            .map(|(passage, similarity)| Candidate::from_passage(passage, similarity))
            .collect()
    }

    /// A copy of every stored passage, in insertion order.
    pub fn passages(&self) -> Vec<IndexedPassage> {
        self.read().passages().to_vec()
    }

    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<IndexedPassage>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_texts(&texts)?;
        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| {
                let source_type = SourceType::from_key(&chunk.source_key);
                IndexedPassage::new(chunk.clone(), embedding, &source_type)
            })
            .collect())
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(texts).map_err(Error::retrieval)?;
        if vectors.len() != texts.len() {
            return Err(Error::retrieval(format!(
                "embedder '{}' returned {} vectors for {} texts",
                self.embedder.id(),
                vectors.len(),
                texts.len()
            )));
        }
        let expected = self.embedder.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(Error::retrieval(Error::DimensionMismatch { expected, got: bad.len() }));
        }
        Ok(vectors)
    }

    fn read(&self) -> RwLockReadGuard<'_, FlatIndex> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FlatIndex> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn candidate_chunk(candidate: Candidate) -> (Chunk, f32) {
    let ordinal = candidate
        .metadata
        .get(sagevault_core::types::META_ORDINAL)
        .and_then(|o| o.parse().ok())
        .unwrap_or_default();
    let chunk = Chunk { id: candidate.id, source_key: candidate.source_key, ordinal, text: candidate.text };
    (chunk, candidate.similarity)
}
