//! JSON snapshots of an embedding index.
//!
//! A snapshot records which embedder produced its vectors; restoring it with a
//! different embedder id or dimension is refused, since the stored vectors
//! would not be comparable to fresh query embeddings.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use sagevault_core::error::{Error, Result};
use sagevault_core::traits::Embedder;
use sagevault_core::types::IndexedPassage;

use crate::flat::FlatIndex;
use crate::index::EmbeddingIndex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub name: String,
    pub embedder_id: String,
    pub dim: usize,
    pub built_at: DateTime<Utc>,
    pub passages: Vec<IndexedPassage>,
}

impl IndexSnapshot {
    pub fn read_from(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| Error::NotFound(format!("{}: {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Snapshot(format!("{}: {e}", path.display())))
    }

    /// Writes through a temp file in the target directory, then renames it into place.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::Snapshot(format!("{}: {e}", dir.display())))?;
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::Snapshot(e.to_string()))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, self).map_err(|e| Error::Snapshot(e.to_string()))?;
            writer.flush().map_err(|e| Error::Snapshot(e.to_string()))?;
        }
        tmp.persist(path).map_err(|e| Error::Snapshot(format!("{}: {e}", path.display())))?;
        Ok(())
    }

    fn check_compatible(&self, embedder: &dyn Embedder) -> Result<()> {
        if self.embedder_id != embedder.id() {
            return Err(Error::Snapshot(format!(
                "snapshot '{}' was built with embedder '{}', not '{}'",
                self.name,
                self.embedder_id,
                embedder.id()
            )));
        }
        if self.dim != embedder.dim() {
            return Err(Error::DimensionMismatch { expected: embedder.dim(), got: self.dim });
        }
        if let Some(p) = self.passages.iter().find(|p| p.embedding.len() != self.dim) {
            return Err(Error::DimensionMismatch { expected: self.dim, got: p.embedding.len() });
        }
        Ok(())
    }
}

impl EmbeddingIndex {
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            name: self.name().to_string(),
            embedder_id: self.embedder().id().to_string(),
            dim: self.dim(),
            built_at: Utc::now(),
            passages: self.passages(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        snapshot.write_to(path)?;
        info!(index = %snapshot.name, passages = snapshot.passages.len(), path = %path.display(), "saved snapshot");
        Ok(())
    }

    pub fn restore(snapshot: IndexSnapshot, embedder: Arc<dyn Embedder>) -> Result<Self> {
        snapshot.check_compatible(embedder.as_ref())?;
        let store = FlatIndex::from_passages(snapshot.passages);
        Ok(Self::with_store(snapshot.name, embedder, store))
    }

    pub fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let snapshot = IndexSnapshot::read_from(path)?;
        info!(
            index = %snapshot.name,
            passages = snapshot.passages.len(),
            built_at = %snapshot.built_at,
            "loading snapshot"
        );
        Self::restore(snapshot, embedder)
    }
}
