//! Embedding seam for condition text.
//!
//! The index records which model produced its vectors, and the matcher
//! refuses to score across models, so every implementation must report a
//! stable `model_id`.

use anyhow::Result;

#[cfg(feature = "embeddings")]
use fastembed::TextEmbedding;

/// Batch text embedder with a fixed model identity.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the embedding model/version.
    fn model_id(&self) -> &str;

    /// Embed each input text into a fixed-length vector.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the default embedder: MiniLM when the `embeddings` feature is on,
/// the deterministic trigram embedder otherwise.
pub fn default_embedder() -> Result<Box<dyn Embedder>> {
    #[cfg(feature = "embeddings")]
    {
        Ok(Box::new(MiniLmEmbedder::load()?))
    }
    #[cfg(not(feature = "embeddings"))]
    {
        Ok(Box::new(TrigramEmbedder::default()))
    }
}

/// MiniLM sentence embeddings via fastembed.
#[cfg(feature = "embeddings")]
pub struct MiniLmEmbedder {
    inner: TextEmbedding,
}

#[cfg(feature = "embeddings")]
impl MiniLmEmbedder {
    pub fn load() -> Result<Self> {
        let inner = TextEmbedding::try_new(Default::default())?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "embeddings")]
impl Embedder for MiniLmEmbedder {
    fn model_id(&self) -> &str {
        "all-MiniLM-L6-v2"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let documents: Vec<&str> = texts.iter().map(String::as_str).collect();
        Ok(self.inner.embed(documents, None)?)
    }
}

const TRIGRAM_DIM: usize = 256;

/// Hashed character-trigram embedding, L2-normalised.
///
/// No model download, fully deterministic, and close enough in behaviour to a
/// sentence embedder for exact and near-exact condition text (case and
/// punctuation differences score high), which keeps the whole pipeline
/// runnable offline and in tests.
#[derive(Debug, Default)]
pub struct TrigramEmbedder;

impl Embedder for TrigramEmbedder {
    fn model_id(&self) -> &str {
        "trigram-hash-256-v1"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| trigram_vector(t)).collect())
    }
}

fn trigram_vector(text: &str) -> Vec<f32> {
    let mut chars: Vec<char> = vec![' '];
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            chars.extend(ch.to_lowercase());
        } else if chars.last() != Some(&' ') {
            chars.push(' ');
        }
    }
    chars.push(' ');

    let mut vector = vec![0.0f32; TRIGRAM_DIM];
    for window in chars.windows(3) {
        let tri: String = window.iter().collect();
        vector[bucket(&tri)] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

// FNV-1a so bucket assignment stays stable across builds.
fn bucket(tri: &str) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in tri.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash % TRIGRAM_DIM as u64) as usize
}

/// Cosine similarity with a zero-norm guard.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        let embedder = TrigramEmbedder;
        let vectors = embedder
            .embed(&["multiple sclerosis".into(), "Multiple Sclerosis".into()])
            .unwrap();
        let sim = cosine(&vectors[0], &vectors[1]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unrelated_text_scores_low() {
        let embedder = TrigramEmbedder;
        let vectors = embedder
            .embed(&["multiple sclerosis".into(), "pancreatic cancer".into()])
            .unwrap();
        assert!(cosine(&vectors[0], &vectors[1]) < 0.8);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
