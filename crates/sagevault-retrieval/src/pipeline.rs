//! Query-time orchestration: gate the query, retrieve, re-rank, gate the
//! passages, enforce the context budget.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use sagevault_core::chunker::ChunkingConfig;
use sagevault_core::config::RetrievalConfig;
use sagevault_core::data_processor::DataProcessor;
use sagevault_core::error::Result;
use sagevault_core::traits::{Embedder, PinLookup};
use sagevault_core::types::{Candidate, Document};
use sagevault_guard::{GuardConfig, QueryDecision, SecurityGate};
use sagevault_index::EmbeddingIndex;

use crate::mmr::select_diverse;
use crate::pin::OverviewPin;
use crate::retriever::{RetrieveContext, Retriever};

pub const DEFAULT_INDEX_NAME: &str = "corpus";

/// Rough, provider-agnostic token estimate.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Owns the collaborators every pipeline call needs.
pub struct PipelineContext {
    embedder: Arc<dyn Embedder>,
    pin: Arc<dyn PinLookup>,
}

impl PipelineContext {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, pin: Arc::new(OverviewPin::default()) }
    }

    #[must_use]
    pub fn with_pin(mut self, pin: Arc<dyn PinLookup>) -> Self {
        self.pin = pin;
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Chunks and embeds `corpus` into a fresh index.
    pub fn build_index(&self, corpus: &[Document], chunk_size: usize, overlap_percent: f32) -> Result<IndexHandle> {
        let chunking = ChunkingConfig::new(chunk_size, overlap_percent);
        let chunks = DataProcessor::new(chunking).process_corpus(corpus);
        let index = EmbeddingIndex::new(DEFAULT_INDEX_NAME, Arc::clone(&self.embedder));
        index.rebuild(&chunks)?;
        let pinned = self.pin.pinned(corpus).cloned();
        info!(
            documents = corpus.len(),
            chunks = chunks.len(),
            pinned = pinned.as_ref().map(|d| d.key.as_str()),
            "built index"
        );
        Ok(IndexHandle { index: Arc::new(index), pinned })
    }

    /// Wraps an index restored elsewhere (e.g. from a snapshot). The pinned
    /// document is chosen from each source's first passage.
    pub fn attach(&self, index: EmbeddingIndex) -> IndexHandle {
        let mut firsts: BTreeMap<String, (usize, String)> = BTreeMap::new();
        for p in index.passages() {
            let entry = firsts.entry(p.chunk.source_key.clone()).or_insert((p.chunk.ordinal, p.chunk.text.clone()));
            if p.chunk.ordinal < entry.0 {
                *entry = (p.chunk.ordinal, p.chunk.text);
            }
        }
        let docs: Vec<Document> = firsts.into_iter().map(|(key, (_, text))| Document { key, text }).collect();
        let pinned = self.pin.pinned(&docs).cloned();
        IndexHandle { index: Arc::new(index), pinned }
    }

    pub fn query(&self, handle: &IndexHandle, query: &str, k: usize, options: &RetrievalConfig) -> Result<RetrievalResult> {
        self.query_with_hints(handle, query, k, options, &[])
    }

    /// Runs one query end to end, returning at most `min(k, options.max_results)`
    /// passages. A query blocked by policy is an `Ok` result with
    /// `blocked = true`; only embedder or index failures are errors.
    pub fn query_with_hints(
        &self,
        handle: &IndexHandle,
        query: &str,
        k: usize,
        options: &RetrievalConfig,
        hints: &[String],
    ) -> Result<RetrievalResult> {
        let options = options.clone().normalized();
        let k = k.min(options.max_results);
        let gate = SecurityGate::new(GuardConfig::from(&options));
        let mut result = RetrievalResult::default();

        let (decision, verdict) = gate.assess_query(query);
        result.diagnostics.query_injection_score = verdict.injection_score;
        result.redactions += verdict.redactions;
        match decision {
            QueryDecision::Block(reason) => return Ok(RetrievalResult::blocked(reason, verdict.injection_score)),
            QueryDecision::Warn(w) => result.warnings.push(w),
            QueryDecision::Allow => {}
        }
        if verdict.redactions > 0 {
            result.warnings.push("Query contained credential-shaped text; it was redacted before search".to_string());
        }
        if k == 0 || handle.index.is_empty() {
            return Ok(result);
        }

        let ctx = RetrieveContext { pinned: handle.pinned.clone(), hints: hints.to_vec() };
        let pool = Retriever::new(&options).retrieve(&verdict.redacted_text, &handle.index, k, &ctx)?;
        result.diagnostics.pool_size = pool.len();

        let pool_len = pool.len();
        let diverse = select_diverse(pool, pool_len, options.mmr_lambda);
        let secured = gate.secure_candidates(diverse);
        result.diagnostics.after_gate = secured.candidates.len();
        result.redactions += secured.redactions;
        result.warnings.extend(secured.warnings);

        let mut ranked = secured.candidates;
        ranked.truncate(k);
        let budget = ContextBudget::new(options.max_context_chars, options.max_context_tokens);
        let (passages, dropped) = budget.apply(ranked);
        if dropped > 0 {
            result.warnings.push(format!("{dropped} passage(s) dropped to fit the context budget"));
        }
        result.diagnostics.dropped_by_budget = dropped;
        result.diagnostics.context_chars = passages.iter().map(|p| p.text.chars().count()).sum();
        result.diagnostics.context_tokens = passages.iter().map(|p| estimate_tokens(&p.text)).sum();
        result.passages = passages;

        info!(
            passages = result.passages.len(),
            pool = result.diagnostics.pool_size,
            redactions = result.redactions,
            warnings = result.warnings.len(),
            "query complete"
        );
        Ok(result)
    }
}

/// A built index plus the pinned document chosen for it.
#[derive(Clone)]
pub struct IndexHandle {
    index: Arc<EmbeddingIndex>,
    pinned: Option<Document>,
}

impl IndexHandle {
    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn pinned(&self) -> Option<&Document> {
        self.pinned.as_ref()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub query_injection_score: u32,
    pub pool_size: usize,
    pub after_gate: usize,
    pub dropped_by_budget: usize,
    pub context_chars: usize,
    pub context_tokens: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    pub passages: Vec<Candidate>,
    pub warnings: Vec<String>,
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub redactions: usize,
    pub diagnostics: Diagnostics,
}

impl RetrievalResult {
    fn blocked(reason: String, score: u32) -> Self {
        warn!(score, "query rejected before retrieval");
        Self {
            warnings: vec![reason.clone()],
            blocked: true,
            block_reason: Some(reason),
            diagnostics: Diagnostics { query_injection_score: score, ..Diagnostics::default() },
            ..Self::default()
        }
    }
}

struct ContextBudget {
    max_chars: usize,
    max_tokens: Option<usize>,
}

impl ContextBudget {
    fn new(max_chars: usize, max_tokens: Option<usize>) -> Self {
        Self { max_chars, max_tokens }
    }

    /// Keeps passages in order while they fit. A first passage that is too
    /// large on its own is truncated rather than dropped.
    fn apply(&self, passages: Vec<Candidate>) -> (Vec<Candidate>, usize) {
        let total = passages.len();
        let mut kept = Vec::new();
        let mut chars = 0usize;
        let mut tokens = 0usize;
        for mut p in passages {
            let len = p.text.chars().count();
            let fits = chars + len <= self.max_chars
                && self.max_tokens.map_or(true, |max| tokens + estimate_tokens(&p.text) <= max);
            if !fits {
                if !kept.is_empty() {
                    break;
                }
                let limit = self.max_tokens.map_or(self.max_chars, |t| self.max_chars.min(t.saturating_mul(4)));
                if limit == 0 {
                    break;
                }
                p.text = p.text.chars().take(limit).collect();
            }
            chars += p.text.chars().count();
            tokens += estimate_tokens(&p.text);
            kept.push(p);
        }
        let dropped = total - kept.len();
        debug!(kept = kept.len(), dropped, chars, tokens, "applied context budget");
        (kept, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sagevault_core::types::Meta;

    fn passage(text: &str) -> Candidate {
        Candidate {
            id: "k::0".into(),
            source_key: "k".into(),
            text: text.into(),
            similarity: 0.5,
            metadata: Meta::new(),
            embedding: Vec::new(),
        }
    }

    #[test]
    fn token_estimate_has_floor_of_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn budget_stops_at_first_overflow() {
        let (kept, dropped) = ContextBudget::new(10, None).apply(vec![passage("12345"), passage("123456"), passage("1")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn oversized_first_passage_is_truncated() {
        let (kept, dropped) = ContextBudget::new(100, Some(2)).apply(vec![passage(&"x".repeat(50))]);
        assert_eq!(kept[0].text.len(), 8);
        assert_eq!(dropped, 0);
    }
}
