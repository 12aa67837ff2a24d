//! Query-time retrieval over a loaded index.

use crate::embeddings::EmbeddingProvider;
use crate::flat_index::FlatIpIndex;
use crate::types::{IndexManifest, ScoredDocument};
use crate::vector::normalize_l2;
use litsearch_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Embeds queries and resolves the nearest index rows to document ids.
#[derive(Debug)]
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: FlatIpIndex,
    ids: Vec<String>,
}

impl Retriever {
    /// Pair a loaded index with the provider used to embed queries.
    ///
    /// When a manifest is given, its model must match the provider's.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: FlatIpIndex,
        ids: Vec<String>,
        manifest: Option<&IndexManifest>,
    ) -> AppResult<Self> {
        if ids.len() != index.len() {
            return Err(AppError::IndexCorrupt(format!(
                "id map has {} entries but index has {} vectors",
                ids.len(),
                index.len()
            )));
        }

        if let Some(manifest) = manifest {
            if manifest.model != provider.model_name() {
                return Err(AppError::ModelMismatch {
                    indexed: manifest.model.clone(),
                    requested: provider.model_name().to_string(),
                });
            }
        }

        Ok(Self {
            provider,
            index,
            ids,
        })
    }

    /// Return at most `k` documents, most similar first.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<ScoredDocument>> {
        if k == 0 {
            return Err(AppError::Config("k must be a positive integer".to_string()));
        }

        let query_vector = self.provider.embed(query).await?;
        let results = search_ids(&self.index, &self.ids, &query_vector, k)?;

        debug!("Retrieved {} documents (k={})", results.len(), k);
        Ok(results)
    }
}

/// Search `index` with an unnormalized query vector and map rows to `ids`.
pub fn search_ids(
    index: &FlatIpIndex,
    ids: &[String],
    query: &[f32],
    k: usize,
) -> AppResult<Vec<ScoredDocument>> {
    let mut query = query.to_vec();
    normalize_l2(&mut query);

    index
        .search(&query, k)?
        .into_iter()
        .map(|(row, score)| {
            let id = ids.get(row).ok_or_else(|| {
                AppError::IndexCorrupt(format!(
                    "search returned row {} but the id map has {} entries",
                    row,
                    ids.len()
                ))
            })?;
            Ok(ScoredDocument {
                id: id.clone(),
                score,
            })
        })
        .collect()
}
