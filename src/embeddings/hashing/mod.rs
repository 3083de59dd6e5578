#[cfg(test)]
mod tests;

use super::Embedder;
use crate::{RagError, Result};

/// Offline embedder based on feature hashing
///
/// Each lowercased alphanumeric token is hashed with blake3 into one of
/// `dimension` buckets with a sign taken from the same digest, then the
/// vector is L2-normalised. Texts sharing vocabulary get high cosine
/// similarity, which is enough for keyword-heavy corpora and for tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::InvalidConfig(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
    }
}

impl Embedder for HashingEmbedder {
    #[inline]
    fn model_id(&self) -> String {
        format!("hashing:d{}", self.dimension)
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];

        for token in Self::tokens(text) {
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let mut bucket_bytes = [0_u8; 8];
            bucket_bytes.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        Ok(vector)
    }
}
