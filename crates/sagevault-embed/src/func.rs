use anyhow::{bail, Result};
use sagevault_core::traits::Embedder;

use crate::math::l2_normalize;

/// Adapts an externally supplied `texts -> vectors` function to the `Embedder` seam.
///
/// Output shape is checked on every call and each vector is re-normalised, so a
/// misbehaving collaborator surfaces as an error instead of corrupting the index.
pub struct FnEmbedder<F> {
    id: String,
    dim: usize,
    embed: F,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&[String]) -> Result<Vec<Vec<f32>>> + Send + Sync,
{
    pub fn new(id: impl Into<String>, dim: usize, embed: F) -> Self {
        Self { id: id.into(), dim, embed }
    }
}

impl<F> Embedder for FnEmbedder<F>
where
    F: Fn(&[String]) -> Result<Vec<Vec<f32>>> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = (self.embed)(texts)?;
        if vectors.len() != texts.len() {
            bail!("embedder '{}' returned {} vectors for {} texts", self.id, vectors.len(), texts.len());
        }
        for v in &mut vectors {
            if v.len() != self.dim {
                bail!("embedder '{}' returned dimension {}, expected {}", self.id, v.len(), self.dim);
            }
            l2_normalize(v);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_closure_and_normalizes() {
        let e = FnEmbedder::new("const", 2, |texts: &[String]| -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|_| vec![3.0, 4.0]).collect()) });
        let out = e.embed_batch(&["a".to_string()]).unwrap();
        assert!((out[0][0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn rejects_wrong_dimension() {
        let e = FnEmbedder::new("bad", 3, |texts: &[String]| -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|_| vec![1.0]).collect()) });
        assert!(e.embed_batch(&["a".to_string()]).is_err());
    }

    #[test]
    fn propagates_collaborator_failure() {
        let e = FnEmbedder::new("down", 3, |_: &[String]| -> Result<Vec<Vec<f32>>> { bail!("service unavailable") });
        let err = e.embed_batch(&["a".to_string()]).unwrap_err();
        assert!(err.to_string().contains("service unavailable"));
    }
}
