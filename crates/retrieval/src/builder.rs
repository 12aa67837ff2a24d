//! Index construction from raw embeddings.

use crate::flat_index::{FlatIpIndex, SearchBackend};
use crate::vector::normalize_l2;
use litsearch_core::{AppError, AppResult};

/// Constructor for the accelerated search backend.
pub type AcceleratorFactory = Box<dyn Fn() -> AppResult<SearchBackend> + Send + Sync>;

/// Builds a [`FlatIpIndex`] from unnormalized embeddings.
pub struct IndexBuilder {
    accelerate: bool,
    accelerator: AcceleratorFactory,
}

impl IndexBuilder {
    /// Create a builder. With `accelerate` set, the index is placed on the
    /// parallel backend when it can be created.
    pub fn new(accelerate: bool) -> Self {
        Self {
            accelerate,
            accelerator: Box::new(|| SearchBackend::accelerated(None)),
        }
    }

    /// Replace how the accelerated backend is constructed.
    pub fn with_accelerator(mut self, accelerator: AcceleratorFactory) -> Self {
        self.accelerator = accelerator;
        self
    }

    /// Normalize `vectors` to unit length and load them into a new index.
    ///
    /// Row `i` of the result is `vectors[i]`. Zero vectors stay zero.
    pub fn build(&self, mut vectors: Vec<Vec<f32>>) -> AppResult<FlatIpIndex> {
        let expected = vectors.len();
        let dimension = match vectors.first() {
            Some(first) if !first.is_empty() => first.len(),
            Some(_) => {
                return Err(AppError::DimensionMismatch {
                    expected: 1,
                    actual: 0,
                })
            }
            None => {
                return Err(AppError::Other(
                    "Cannot build an index from zero vectors".to_string(),
                ))
            }
        };

        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(AppError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        for v in vectors.iter_mut() {
            normalize_l2(v);
        }

        let backend = self.select_backend();
        tracing::info!(
            "Building flat inner-product index ({} backend, dimension {})",
            backend.name(),
            dimension
        );

        let mut index = FlatIpIndex::new(dimension).with_backend(backend);
        index.add(&vectors)?;

        if index.len() != expected {
            return Err(AppError::IndexCorrupt(format!(
                "index holds {} vectors after adding {}",
                index.len(),
                expected
            )));
        }

        tracing::info!("Index built with {} vectors", index.len());
        Ok(index)
    }

    /// Backend for a new or reloaded index, falling back to sequential search
    /// when acceleration is off or unavailable.
    pub fn select_backend(&self) -> SearchBackend {
        if !self.accelerate {
            return SearchBackend::Sequential;
        }

        match (self.accelerator)() {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!("Accelerated search unavailable, using sequential: {}", e);
                SearchBackend::Sequential
            }
        }
    }
}
