//! Domain types shared by the chunker, index, retriever and security gate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Key prefix marking documents uploaded by the user rather than fetched from a repository.
pub const UPLOADED_PREFIX: &str = "uploaded:";

/// Metadata keys every indexed passage carries.
pub const META_SOURCE_KEY: &str = "source_key";
pub const META_ORDINAL: &str = "ordinal";
pub const META_SOURCE_TYPE: &str = "source_type";

/// A raw document of the corpus.
///
/// - `key`: stable provenance identifier (relative path, or `uploaded:<name>`)
/// - `text`: full text payload, replaced wholesale on re-index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub key: String,
    pub text: String,
}

impl Document {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self { key: key.into(), text: text.into() }
    }

    pub fn source_type(&self) -> SourceType {
        SourceType::from_key(&self.key)
    }
}

/// Where a passage came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Repository,
    Uploaded,
    Custom(String),
}

impl SourceType {
    /// `uploaded:`-prefixed keys are uploads, everything else is repository content.
    pub fn from_key(key: &str) -> Self {
        if key.starts_with(UPLOADED_PREFIX) { Self::Uploaded } else { Self::Repository }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "repository" => Self::Repository,
            "uploaded" => Self::Uploaded,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Repository => "repository",
            Self::Uploaded => "uploaded",
            Self::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded passage of a source document; the unit of indexing.
///
/// `id` is derived from `source_key` and `ordinal` and is unique within an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source_key: String,
    pub ordinal: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(source_key: &str, ordinal: usize, text: impl Into<String>) -> Self {
        Self { id: chunk_id(source_key, ordinal), source_key: source_key.to_string(), ordinal, text: text.into() }
    }
}

pub fn chunk_id(source_key: &str, ordinal: usize) -> ChunkId {
    format!("{source_key}::{ordinal}")
}

/// A chunk together with its embedding and metadata, as stored by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub metadata: Meta,
}

impl IndexedPassage {
    /// Builds the passage with the minimum metadata: source key, ordinal and source type.
    pub fn new(chunk: Chunk, embedding: Vec<f32>, source_type: &SourceType) -> Self {
        let mut metadata = Meta::new();
        metadata.insert(META_SOURCE_KEY.to_string(), chunk.source_key.clone());
        metadata.insert(META_ORDINAL.to_string(), chunk.ordinal.to_string());
        metadata.insert(META_SOURCE_TYPE.to_string(), source_type.as_str().to_string());
        Self { chunk, embedding, metadata }
    }

    pub fn source_type(&self) -> SourceType {
        self.metadata
            .get(META_SOURCE_TYPE)
            .map_or_else(|| SourceType::from_key(&self.chunk.source_key), |tag| SourceType::parse(tag))
    }
}

/// A query-scoped retrieval candidate. Never persisted.
///
/// `similarity` is always within `[0, 1]`; 1.0 means identical to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ChunkId,
    pub source_key: String,
    pub text: String,
    pub similarity: f32,
    pub metadata: Meta,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl Candidate {
    pub fn from_passage(passage: &IndexedPassage, similarity: f32) -> Self {
        Self {
            id: passage.chunk.id.clone(),
            source_key: passage.chunk.source_key.clone(),
            text: passage.chunk.text.clone(),
            similarity: clamp_unit(similarity),
            metadata: passage.metadata.clone(),
            embedding: passage.embedding.clone(),
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.metadata
            .get(META_SOURCE_TYPE)
            .map_or_else(|| SourceType::from_key(&self.source_key), |tag| SourceType::parse(tag))
    }
}

/// Outcome of running one text or one candidate through the security gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityVerdict {
    pub injection_score: u32,
    pub redacted_text: String,
    pub warning: Option<String>,
    pub adjusted_similarity: f32,
    pub redactions: usize,
}

impl SecurityVerdict {
    pub fn is_suspicious(&self) -> bool {
        self.injection_score > 0
    }
}

/// Clamps a score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_derived_from_key_and_ordinal() {
        let c = Chunk::new("docs/guide.md", 3, "text");
        assert_eq!(c.id, "docs/guide.md::3");
        assert_ne!(c.id, Chunk::new("docs/guide.md", 4, "text").id);
    }

    #[test]
    fn source_type_follows_upload_prefix() {
        assert_eq!(SourceType::from_key("uploaded:notes.pdf"), SourceType::Uploaded);
        assert_eq!(SourceType::from_key("src/main.rs"), SourceType::Repository);
        assert_eq!(SourceType::parse("wiki"), SourceType::Custom("wiki".into()));
    }

    #[test]
    fn passage_metadata_has_required_keys() {
        let p = IndexedPassage::new(Chunk::new("a.py", 0, "x"), vec![1.0], &SourceType::Repository);
        assert_eq!(p.metadata[META_SOURCE_KEY], "a.py");
        assert_eq!(p.metadata[META_ORDINAL], "0");
        assert_eq!(p.metadata[META_SOURCE_TYPE], "repository");
    }

    #[test]
    fn clamp_unit_handles_nan_and_range() {
        assert_eq!(clamp_unit(f32::NAN), 0.0);
        assert_eq!(clamp_unit(1.4), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
    }
}
