//! sagevault-index
//!
//! The embedding index: passages stored with their vectors and metadata,
//! searched by cosine similarity. `FlatIndex` is the storage backend behind the
//! `VectorIndexer` seam; `EmbeddingIndex` pairs it with an embedder and
//! serializes rebuilds against queries. Indexes can be saved to and restored
//! from JSON snapshots.

pub mod flat;
pub mod index;
pub mod snapshot;

pub use flat::FlatIndex;
pub use index::EmbeddingIndex;
pub use snapshot::IndexSnapshot;
