//! In-memory embedding index keyed by note id.

use std::collections::HashMap;

/// Anything that can score how alike two notes are.
///
/// `None` means at least one side has no embedding; callers skip the pair.
pub trait SimilarityLookup {
    fn similarity(&self, a: &str, b: &str) -> Option<f32>;
}

/// Note id -> embedding, fixed dimensionality once the first vector lands.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: HashMap<String, Vec<f32>>,
    /// 0 until the first insert
    dimensions: usize,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            dimensions: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the embedding for `id`.
    pub fn insert(&mut self, id: &str, embedding: Vec<f32>) -> Result<(), IndexError> {
        if embedding.is_empty() {
            return Err(IndexError::EmptyVector);
        }

        if self.dimensions != 0 && embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFinite);
        }

        self.dimensions = embedding.len();
        self.entries.insert(id.to_string(), embedding);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl SimilarityLookup for VectorIndex {
    fn similarity(&self, a: &str, b: &str) -> Option<f32> {
        let a = self.entries.get(a)?;
        let b = self.entries.get(b)?;
        Some(cosine_similarity(a, b))
    }
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity of two vectors.
///
/// Zero-norm vectors and vectors of different length score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot_product / (norm_a * norm_b)
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store an empty embedding")]
    EmptyVector,

    #[error("Embedding contains NaN or infinite components")]
    NonFinite,
}
