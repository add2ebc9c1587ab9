//! Embedding backend (spec §4.4). The concrete model is out of scope (spec
//! §1: "concrete ... embedding/keyword ML models (pluggable interfaces
//! only)"); this module defines the trait, a lazy-singleton loader, and a
//! typed failure surface, following the teacher's pattern of keeping ML/IO
//! backends behind a trait object (`OcrBackend`) rather than hardcoding one
//! implementation.

use std::sync::OnceLock;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("embedding call failed: {0}")]
    InferenceFailed(String),
}

/// Produces fixed-dimension dense vectors for a batch of chunk texts.
/// Implementations must be safe to share across worker tasks once loaded
/// (spec §9: "process-wide immutable state with lazy initialization").
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> u32;

    /// Caller receives results in the same order as `texts` (spec §4.4).
    /// The micro-batch size is an implementation detail of the backend.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// One-shot, thread-safe singleton initializer, matching spec §9's "Use a
/// one-shot initializer guarded by an atomic flag; all callers after the
/// first reuse the ready instance."
pub struct LazyEmbedder<F> {
    cell: OnceLock<Box<dyn Embedder>>,
    init: F,
}

impl<F> LazyEmbedder<F>
where
    F: Fn() -> Result<Box<dyn Embedder>, EmbedError>,
{
    pub fn new(init: F) -> Self {
        Self {
            cell: OnceLock::new(),
            init,
        }
    }

    pub fn get_or_init(&self) -> Result<&dyn Embedder, EmbedError> {
        if let Some(existing) = self.cell.get() {
            return Ok(existing.as_ref());
        }
        let built = (self.init)()?;
        Ok(self.cell.get_or_init(|| built).as_ref())
    }
}

/// Splits a document's chunk texts into model-sized micro-batches and
/// embeds each, preserving input order (spec §4.6 "embedding" state).
pub fn embed_in_micro_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let mut out = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size.max(1)) {
        let mut vectors = embedder.embed_batch(chunk)?;
        out.append(&mut vectors);
    }
    Ok(out)
}

/// Deterministic placeholder backend used when no real embedding model is
/// wired in. A hash-based projection into `dimensions` floats -- not a
/// real embedding space, but stable and dependency-free, matching the
/// role the teacher's `OcrsBackend`/`PaddleBackend` play as always-present
/// fallbacks behind the same trait as the primary implementation.
pub struct HashEmbedder {
    dimensions: u32,
}

impl HashEmbedder {
    pub fn new(dimensions: u32) -> Self {
        Self { dimensions }
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> u32 {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimensions as usize];
                for (i, byte) in text.bytes().enumerate() {
                    let slot = i % vector.len().max(1);
                    vector[slot] += byte as f32 / 255.0;
                }
                let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in &mut vector {
                        *v /= norm;
                    }
                }
                vector
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubEmbedder {
        dim: u32,
    }

    impl Embedder for StubEmbedder {
        fn dimensions(&self) -> u32 {
            self.dim
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts.iter().map(|_| vec![0.0; self.dim as usize]).collect())
        }
    }

    #[test]
    fn micro_batches_preserve_order_and_count() {
        let embedder = StubEmbedder { dim: 4 };
        let texts: Vec<String> = (0..7).map(|i| format!("chunk-{i}")).collect();
        let result = embed_in_micro_batches(&embedder, &texts, 3).unwrap();
        assert_eq!(result.len(), 7);
        assert!(result.iter().all(|v| v.len() == 4));
    }

    #[test]
    fn lazy_embedder_initializes_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let lazy = LazyEmbedder::new(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubEmbedder { dim: 8 }) as Box<dyn Embedder>)
        });
        lazy.get_or_init().unwrap();
        lazy.get_or_init().unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }
}
