use sagevault_core::config::EmbeddingConfig;
use sagevault_embed::{cosine_similarity, default_embedder};

#[test]
fn default_embedder_shapes_and_determinism() {
    let embedder = default_embedder(&EmbeddingConfig { dim: 256 });
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 256, "embedding dim follows config");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn related_texts_score_higher_than_unrelated() {
    let embedder = default_embedder(&EmbeddingConfig::default());
    let texts = vec![
        "how to install".to_string(),
        "Install: run pip install sagevault".to_string(),
        "quarterly revenue spreadsheet".to_string(),
    ];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let related = cosine_similarity(&embs[0], &embs[1]);
    let unrelated = cosine_similarity(&embs[0], &embs[2]);
    assert!(related > 0.0);
    assert!(related > unrelated, "related={related} unrelated={unrelated}");
}

#[test]
fn empty_text_embeds_to_a_valid_vector() {
    let embedder = default_embedder(&EmbeddingConfig { dim: 16 });
    let embs = embedder.embed_batch(&[String::new()]).expect("embed_batch");
    assert_eq!(embs[0].len(), 16);
    assert!(embs[0].iter().all(|x| x.is_finite()));
}
