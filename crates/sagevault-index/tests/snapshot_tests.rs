use std::sync::Arc;

use sagevault_core::data_processor::{corpus_from_map, DataProcessor};
use sagevault_core::error::Error;
use sagevault_core::types::SourceType;
use sagevault_embed::HashingEmbedder;
use sagevault_index::{EmbeddingIndex, IndexSnapshot};

fn built_index() -> EmbeddingIndex {
    let corpus = corpus_from_map([
        ("README.md", "SageVault is a demo tool. ## Install\nRun pip install."),
        ("uploaded:notes.txt", "Meeting notes about the release schedule."),
    ]);
    let chunks = DataProcessor::default().process_corpus(&corpus);
    let index = EmbeddingIndex::new("demo", Arc::new(HashingEmbedder::new(128)));
    index.rebuild(&chunks).expect("rebuild");
    index
}

#[test]
fn snapshot_round_trip_preserves_search_results() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("nested/demo.json");
    let index = built_index();
    index.save(&path)?;

    let restored = EmbeddingIndex::load(&path, Arc::new(HashingEmbedder::new(128)))?;
    assert_eq!(restored.name(), "demo");
    assert_eq!(restored.len(), index.len());

    let before = index.search("install", 1)?;
    let after = restored.search("install", 1)?;
    assert_eq!(before[0].id, after[0].id);
    assert_eq!(after[0].source_key, "README.md");
    Ok(())
}

#[test]
fn uploaded_source_type_survives_snapshot() -> anyhow::Result<()> {
    let snapshot = built_index().snapshot();
    let json = serde_json::to_string(&snapshot)?;
    let back: IndexSnapshot = serde_json::from_str(&json)?;
    let uploaded = back.passages.iter().find(|p| p.chunk.source_key.starts_with("uploaded:"));
    assert_eq!(uploaded.map(|p| p.source_type()), Some(SourceType::Uploaded));
    Ok(())
}

#[test]
fn snapshot_from_other_embedder_is_rejected() {
    let snapshot = built_index().snapshot();
    let err = EmbeddingIndex::restore(snapshot, Arc::new(HashingEmbedder::new(64))).err();
    assert!(matches!(err, Some(Error::Snapshot(_))), "different id is refused: {err:?}");
}

#[test]
fn missing_snapshot_is_not_found() {
    let err = EmbeddingIndex::load(std::path::Path::new("/no/such/snapshot.json"), Arc::new(HashingEmbedder::new(8))).err();
    assert!(matches!(err, Some(Error::NotFound(_))));
}
