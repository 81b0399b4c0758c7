//! sagevault-embed
//!
//! Embedding functions satisfying `sagevault_core::traits::Embedder`: a
//! deterministic feature-hashing embedder for offline use and tests, an adapter
//! for externally injected embedding closures, and a content-hash cache that
//! avoids re-embedding unchanged passages on rebuild.

pub mod cache;
pub mod func;
pub mod hashing;
pub mod math;
pub mod tokenize;

use std::sync::Arc;

use sagevault_core::config::EmbeddingConfig;
use sagevault_core::traits::Embedder;

pub use cache::{content_hash, CacheStats, CachedEmbedder};
pub use func::FnEmbedder;
pub use hashing::HashingEmbedder;
pub use math::{cosine_similarity, l2_normalize};

/// The embedder used when the caller does not inject one: hashing features, cached.
pub fn default_embedder(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    let inner: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(config.dim));
    Arc::new(CachedEmbedder::new(inner))
}
