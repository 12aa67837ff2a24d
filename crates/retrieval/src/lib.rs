//! Biomedical literature retrieval core.
//!
//! Offline, [`build_index`] loads the abstract corpus, embeds every document,
//! builds a flat inner-product index over the normalized vectors and writes it
//! next to the identifier map. At query time, [`open_retriever`] loads both
//! back and returns a [`Retriever`] that answers top-k queries.

pub mod builder;
pub mod checkpoint;
pub mod corpus;
pub mod embeddings;
pub mod flat_index;
pub mod persistence;
pub mod progress;
pub mod retriever;
pub mod types;
pub mod vector;

#[cfg(test)]
mod tests;

pub use builder::IndexBuilder;
pub use corpus::{load_corpus, read_document_text, Corpus};
pub use embeddings::{create_provider, EmbeddingGenerator, EmbeddingProvider, GeneratorOptions};
pub use flat_index::{FlatIpIndex, SearchBackend};
pub use persistence::{load_index, save_index, IndexPaths};
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter};
pub use retriever::Retriever;
pub use types::{BuildReport, Document, IndexManifest, IndexStats, ScoredDocument};

use chrono::Utc;
use litsearch_core::{AppConfig, AppError, AppResult};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Build and persist the index for the configured corpus.
///
/// Fails with [`AppError::CorpusEmpty`] before anything is written when the
/// corpus has no usable documents.
pub async fn build_index(
    config: &AppConfig,
    provider: Arc<dyn EmbeddingProvider>,
    progress: ProgressReporter,
) -> AppResult<BuildReport> {
    let start = Instant::now();

    tracing::info!(
        "Starting build: corpus={:?}, index={:?}, model={}",
        config.corpus_dir,
        config.index_dir,
        provider.model_name()
    );

    let corpus = load_corpus(&config.corpus_dir)?;
    progress.load(corpus.len() as u64, &config.corpus_dir.display().to_string());

    let options = GeneratorOptions::from_settings(&config.embedding, Some(config.checkpoint_file()));
    let generated = EmbeddingGenerator::new(Arc::clone(&provider), options)
        .with_progress(progress.clone())
        .generate(&corpus.texts)
        .await?;

    let dimension = generated.dimension;
    let index = IndexBuilder::new(config.accelerate).build(generated.vectors)?;
    let backend = index.backend().name().to_string();
    progress.index(index.len() as u64, &backend);

    let paths = IndexPaths::in_dir(&config.index_dir);
    let (index_path, id_map_path) = save_index(&index, &corpus.ids, &paths)?;

    let manifest = IndexManifest {
        provider: provider.provider_name().to_string(),
        model: provider.model_name().to_string(),
        dimension,
        count: index.len(),
        built_at: Utc::now(),
    };
    persistence::save_manifest(&manifest, &paths.manifest)?;
    progress.save(index.len() as u64, &config.index_dir.display().to_string());

    let duration = start.elapsed();

    tracing::info!(
        "Build completed: {} documents ({} degraded, {} resumed, {} retried) in {:.2}s",
        index.len(),
        generated.degraded.len(),
        generated.resumed,
        generated.retried,
        duration.as_secs_f64()
    );

    Ok(BuildReport {
        documents: index.len(),
        degraded: generated.degraded,
        resumed: generated.resumed,
        retried: generated.retried,
        dimension,
        backend,
        index_path,
        id_map_path,
        duration_secs: duration.as_secs_f64(),
    })
}

/// Load the persisted index for querying with `provider`.
pub fn open_retriever(
    config: &AppConfig,
    provider: Arc<dyn EmbeddingProvider>,
) -> AppResult<Retriever> {
    let paths = IndexPaths::in_dir(&config.index_dir);
    let (mut index, ids) = load_index(&paths.index, &paths.id_map)?;

    let manifest = persistence::load_manifest(&paths.manifest)?;
    if manifest.is_none() {
        tracing::warn!(
            "No manifest in {:?}; cannot check that the query model matches the index",
            config.index_dir
        );
    }

    index.set_backend(IndexBuilder::new(config.accelerate).select_backend());

    tracing::debug!(
        "Opened index with {} vectors ({} backend)",
        index.len(),
        index.backend().name()
    );

    Retriever::new(provider, index, ids, manifest.as_ref())
}

/// Describe the persisted index.
pub fn stats(config: &AppConfig) -> AppResult<IndexStats> {
    let paths = IndexPaths::in_dir(&config.index_dir);
    if !paths.index.is_file() {
        return Err(AppError::IndexNotFound { path: paths.index });
    }

    let index_size_bytes = fs::metadata(&paths.index)?.len();

    if !paths.id_map.is_file() {
        return Err(AppError::IndexNotFound { path: paths.id_map });
    }

    let content = fs::read_to_string(&paths.id_map)?;
    let ids: Vec<String> = serde_json::from_str(&content).map_err(|e| {
        AppError::IndexCorrupt(format!("id map {:?} is unreadable: {}", paths.id_map, e))
    })?;
    let ids_count = ids.len();

    Ok(IndexStats {
        index_dir: config.index_dir.clone(),
        manifest: persistence::load_manifest(&paths.manifest)?,
        ids_count,
        index_size_bytes,
        checkpoint_present: config.checkpoint_file().is_file(),
    })
}

/// Remove the persisted index, identifier map, manifest and checkpoint.
///
/// Returns the files that were actually removed.
pub fn clean(config: &AppConfig) -> AppResult<Vec<PathBuf>> {
    let paths = IndexPaths::in_dir(&config.index_dir);
    let mut removed = Vec::new();

    for path in [
        paths.index,
        paths.id_map,
        paths.manifest,
        config.checkpoint_file(),
    ] {
        if path.is_file() {
            fs::remove_file(&path)?;
            tracing::info!("Removed {:?}", path);
            removed.push(path);
        }
    }

    Ok(removed)
}
