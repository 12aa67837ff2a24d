//! Embedding generation for the corpus.
//!
//! [`EmbeddingGenerator`] walks the corpus texts in order, one provider call
//! at a time, and produces exactly one vector per text. A failed call never
//! aborts the run: the document gets an all-zero placeholder and its position
//! is reported as degraded. Progress is checkpointed so an interrupted run can
//! pick up where it stopped.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use crate::checkpoint::{content_key, Checkpoint};
use crate::progress::ProgressReporter;
use litsearch_core::config::EmbeddingSettings;
use litsearch_core::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Knobs for a generation run.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Where progress is persisted; `None` disables checkpointing
    pub checkpoint_path: Option<PathBuf>,

    /// Save the checkpoint every this many completed vectors (0 = only at the end)
    pub checkpoint_every: usize,

    /// Pause between consecutive provider calls
    pub request_delay: Duration,
}

impl GeneratorOptions {
    pub fn from_settings(settings: &EmbeddingSettings, checkpoint_path: Option<PathBuf>) -> Self {
        Self {
            checkpoint_path,
            checkpoint_every: settings.checkpoint_every,
            request_delay: Duration::from_millis(settings.request_delay_ms),
        }
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            checkpoint_path: None,
            checkpoint_every: 500,
            request_delay: Duration::from_millis(100),
        }
    }
}

/// Output of [`EmbeddingGenerator::generate`].
#[derive(Debug, Clone, Default)]
pub struct GeneratedEmbeddings {
    /// One vector per input text, same order
    pub vectors: Vec<Vec<f32>>,

    /// Positions holding a zero placeholder
    pub degraded: Vec<usize>,

    /// Vectors taken over from the checkpoint
    pub resumed: usize,

    /// Checkpointed placeholders that were embedded successfully this time
    pub retried: usize,

    /// Dimensionality of every vector
    pub dimension: usize,
}

/// Sequential, resumable embedder.
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    options: GeneratorOptions,
    progress: ProgressReporter,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, options: GeneratorOptions) -> Self {
        Self {
            provider,
            options,
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Embed `texts`, resuming from the checkpoint when one matches.
    ///
    /// Placeholders carried over from the checkpoint are embedded again before
    /// new documents. Only structural problems are returned as errors: an
    /// unreadable checkpoint, a failed checkpoint write, or a provider whose
    /// successful responses disagree on dimensionality.
    pub async fn generate(&self, texts: &[String]) -> AppResult<GeneratedEmbeddings> {
        let model = self.provider.model_name().to_string();
        let total = texts.len();

        let mut checkpoint = self.resume_point(texts, &model)?;
        let resumed = checkpoint.len();

        let mut placeholders: Vec<usize> = Vec::new();
        let mut dimension: Option<usize> = None;
        for (i, vector) in checkpoint.embeddings.iter().enumerate() {
            if is_placeholder(vector) {
                placeholders.push(i);
            } else if dimension.is_none() {
                dimension = Some(vector.len());
            }
        }

        if resumed > 0 {
            info!(
                "Resuming from checkpoint: {} of {} embeddings already done, {} to retry",
                resumed,
                total,
                placeholders.len()
            );
        }

        let mut calls = 0usize;
        let mut degraded: Vec<usize> = Vec::new();
        let mut retried = 0usize;

        for position in placeholders {
            self.pause(&mut calls).await;
            match self.embed_one(position, &texts[position]).await {
                Some(vector) => {
                    self.check_dimension(&mut dimension, vector.len(), &checkpoint)?;
                    if !is_placeholder(&vector) {
                        retried += 1;
                    }
                    checkpoint.embeddings[position] = vector;
                }
                None => degraded.push(position),
            }
        }

        if retried > 0 {
            info!("Recovered {} previously failed embeddings", retried);
            self.save_checkpoint(&checkpoint)?;
        }

        for (i, text) in texts.iter().enumerate().skip(resumed) {
            self.pause(&mut calls).await;

            let vector = match self.embed_one(i, text).await {
                Some(vector) => {
                    self.check_dimension(&mut dimension, vector.len(), &checkpoint)?;
                    vector
                }
                None => {
                    degraded.push(i);
                    vec![0.0; dimension.unwrap_or_else(|| self.provider.dimensions())]
                }
            };

            checkpoint.push(vector, content_key(text));
            self.after_vector(&checkpoint, total, &model)?;
        }

        // Placeholders written before the first real vector take its size
        let dimension = dimension.unwrap_or_else(|| self.provider.dimensions());
        for position in &degraded {
            if checkpoint.embeddings[*position].len() != dimension {
                checkpoint.embeddings[*position] = vec![0.0; dimension];
            }
        }

        self.save_checkpoint(&checkpoint)?;

        if !degraded.is_empty() {
            warn!(
                "{} of {} documents could not be embedded and carry zero vectors",
                degraded.len(),
                total
            );
        }

        degraded.sort_unstable();

        Ok(GeneratedEmbeddings {
            vectors: checkpoint.embeddings,
            degraded,
            resumed,
            retried,
            dimension,
        })
    }

    /// One provider call. `None` means the document gets a placeholder.
    async fn embed_one(&self, position: usize, text: &str) -> Option<Vec<f32>> {
        match self.provider.embed(text).await {
            Ok(vector) if vector.iter().all(|x| x.is_finite()) => Some(vector),
            Ok(_) => {
                warn!(
                    "Embedding for document {} has non-finite components, treating it as failed",
                    position
                );
                None
            }
            Err(e) => {
                warn!("Embedding failed for document {}: {}", position, e);
                None
            }
        }
    }

    /// Fix the dimension on the first real vector and reject any later change.
    fn check_dimension(
        &self,
        dimension: &mut Option<usize>,
        actual: usize,
        checkpoint: &Checkpoint,
    ) -> AppResult<()> {
        match *dimension {
            Some(expected) if expected != actual => {
                self.save_checkpoint(checkpoint)?;
                Err(AppError::DimensionMismatch { expected, actual })
            }
            Some(_) => Ok(()),
            None => {
                *dimension = Some(actual);
                Ok(())
            }
        }
    }

    async fn pause(&self, calls: &mut usize) {
        if *calls > 0 && !self.options.request_delay.is_zero() {
            tokio::time::sleep(self.options.request_delay).await;
        }
        *calls += 1;
    }

    /// Load the checkpoint and cut it back to the part that still matches.
    fn resume_point(&self, texts: &[String], model: &str) -> AppResult<Checkpoint> {
        let fresh = Checkpoint {
            model: Some(model.to_string()),
            ..Default::default()
        };

        let Some(path) = &self.options.checkpoint_path else {
            return Ok(fresh);
        };
        let Some(mut checkpoint) = Checkpoint::load(path)? else {
            return Ok(fresh);
        };

        if let Some(recorded) = &checkpoint.model {
            if recorded != model {
                warn!(
                    "Ignoring checkpoint {:?}: produced by model '{}', current model is '{}'",
                    path, recorded, model
                );
                return Ok(fresh);
            }
        }

        let reusable = checkpoint.reusable_prefix(texts);
        if reusable < checkpoint.len() {
            warn!(
                "Checkpoint {:?} covers {} documents but only the first {} still match",
                path,
                checkpoint.len(),
                reusable
            );
        }

        checkpoint.truncate(reusable);
        checkpoint.adopt_keys(texts);
        checkpoint.model = Some(model.to_string());
        Ok(checkpoint)
    }

    fn after_vector(&self, checkpoint: &Checkpoint, total: usize, model: &str) -> AppResult<()> {
        let done = checkpoint.len();
        self.progress.embed(done as u64, total as u64, model);

        let every = self.options.checkpoint_every;
        if every > 0 && done % every == 0 && done < total {
            self.save_checkpoint(checkpoint)?;
            self.progress.checkpoint(done as u64, total as u64);
        }
        Ok(())
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> AppResult<()> {
        if let Some(path) = &self.options.checkpoint_path {
            checkpoint.save(path)?;
            debug!("Checkpoint saved: {} embeddings -> {:?}", checkpoint.len(), path);
        }
        Ok(())
    }
}

fn is_placeholder(vector: &[f32]) -> bool {
    vector.iter().all(|&x| x == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::mock::MockProvider;
    use crate::progress::ProgressEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fails on the listed call positions, embeds with the mock otherwise.
    #[derive(Debug)]
    struct FlakyProvider {
        inner: MockProvider,
        fail_on: Vec<usize>,
        calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(dimensions: usize, fail_on: Vec<usize>) -> Self {
            Self {
                inner: MockProvider::new("flaky", dimensions),
                fail_on,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                return Err(AppError::EmbeddingProvider("connection refused".to_string()));
            }
            self.inner.embed(text).await
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("abstract {} on protein kinase {}", i, i * 7))
            .collect()
    }

    fn options(checkpoint_path: Option<PathBuf>, every: usize) -> GeneratorOptions {
        GeneratorOptions {
            checkpoint_path,
            checkpoint_every: every,
            request_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_one_vector_per_text() {
        let provider = Arc::new(FlakyProvider::new(16, vec![0, 3, 4]));
        let generator = EmbeddingGenerator::new(provider, options(None, 500));

        let input = texts(6);
        let output = generator.generate(&input).await.unwrap();

        assert_eq!(output.vectors.len(), input.len());
        assert_eq!(output.degraded, vec![0, 3, 4]);
        assert!(output.vectors.iter().all(|v| v.len() == 16));
    }

    #[tokio::test]
    async fn test_failed_document_gets_zero_vector() {
        let provider = Arc::new(FlakyProvider::new(8, vec![1]));
        let generator = EmbeddingGenerator::new(provider, options(None, 500));

        let input = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let output = generator.generate(&input).await.unwrap();

        assert_eq!(output.vectors.len(), 3);
        assert_eq!(output.vectors[1], vec![0.0; 8]);
        assert_eq!(output.degraded, vec![1]);
        assert_eq!(output.dimension, 8);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let provider = Arc::new(MockProvider::new("mock", 8));
        let generator = EmbeddingGenerator::new(provider, options(None, 500));
        let output = generator.generate(&[]).await.unwrap();
        assert!(output.vectors.is_empty());
        assert_eq!(output.dimension, 8);
    }

    #[tokio::test]
    async fn test_resume_matches_single_pass() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        let input = texts(10);

        let single_pass = EmbeddingGenerator::new(
            Arc::new(MockProvider::new("mock", 32)),
            options(None, 500),
        )
        .generate(&input)
        .await
        .unwrap();

        // First run only sees the first five documents
        let first = EmbeddingGenerator::new(
            Arc::new(MockProvider::new("mock", 32)),
            options(Some(path.clone()), 500),
        )
        .generate(&input[..5])
        .await
        .unwrap();
        assert_eq!(first.vectors.len(), 5);
        assert_eq!(Checkpoint::load(&path).unwrap().unwrap().len(), 5);

        let resumed = EmbeddingGenerator::new(
            Arc::new(MockProvider::new("mock", 32)),
            options(Some(path.clone()), 500),
        )
        .generate(&input)
        .await
        .unwrap();

        assert_eq!(resumed.resumed, 5);
        assert_eq!(resumed.vectors, single_pass.vectors);
    }

    #[tokio::test]
    async fn test_resume_skips_provider_for_done_documents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        let input = texts(4);

        EmbeddingGenerator::new(
            Arc::new(MockProvider::new("flaky", 8)),
            options(Some(path.clone()), 500),
        )
        .generate(&input[..3])
        .await
        .unwrap();

        let provider = Arc::new(FlakyProvider::new(8, vec![]));
        let output = EmbeddingGenerator::new(provider.clone(), options(Some(path), 500))
            .generate(&input)
            .await
            .unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(output.vectors.len(), 4);
    }

    #[tokio::test]
    async fn test_changed_text_invalidates_rest_of_checkpoint() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        let mut input = texts(4);

        EmbeddingGenerator::new(
            Arc::new(MockProvider::new("mock", 8)),
            options(Some(path.clone()), 500),
        )
        .generate(&input)
        .await
        .unwrap();

        input[2] = "a rewritten abstract".to_string();
        let output = EmbeddingGenerator::new(
            Arc::new(MockProvider::new("mock", 8)),
            options(Some(path), 500),
        )
        .generate(&input)
        .await
        .unwrap();

        assert_eq!(output.resumed, 2);
        let expected = MockProvider::new("mock", 8)
            .embed("a rewritten abstract")
            .await
            .unwrap();
        assert_eq!(output.vectors[2], expected);
    }

    #[tokio::test]
    async fn test_checkpoint_from_other_model_is_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        let input = texts(3);

        EmbeddingGenerator::new(
            Arc::new(MockProvider::new("model-a", 8)),
            options(Some(path.clone()), 500),
        )
        .generate(&input)
        .await
        .unwrap();

        let output = EmbeddingGenerator::new(
            Arc::new(MockProvider::new("model-b", 8)),
            options(Some(path.clone()), 500),
        )
        .generate(&input)
        .await
        .unwrap();

        assert_eq!(output.resumed, 0);
        let saved = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(saved.model.as_deref(), Some("model-b"));
    }

    #[tokio::test]
    async fn test_periodic_checkpoint_events() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let generator = EmbeddingGenerator::new(
            Arc::new(MockProvider::new("mock", 8)),
            options(Some(path.clone()), 2),
        )
        .with_progress(ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
            sink.lock().unwrap().push(event);
        })));

        generator.generate(&texts(5)).await.unwrap();

        let captured = events.lock().unwrap();
        let checkpoints: Vec<u64> = captured
            .iter()
            .filter(|e| e.phase == "checkpoint")
            .map(|e| e.current)
            .collect();
        assert_eq!(checkpoints, vec![2, 4]);
        assert_eq!(Checkpoint::load(&path).unwrap().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_placeholders_adopt_real_dimension() {
        #[derive(Debug)]
        struct FixedWidth;

        #[async_trait::async_trait]
        impl EmbeddingProvider for FixedWidth {
            fn provider_name(&self) -> &str {
                "fixed"
            }
            fn model_name(&self) -> &str {
                "fixed"
            }
            fn dimensions(&self) -> usize {
                1024
            }
            async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
                if text == "fail" {
                    return Err(AppError::EmbeddingProvider("timeout".to_string()));
                }
                Ok(vec![1.0, 0.0, 0.0])
            }
        }

        let generator = EmbeddingGenerator::new(Arc::new(FixedWidth), options(None, 500));
        let input = vec!["fail".to_string(), "ok".to_string(), "fail".to_string()];
        let output = generator.generate(&input).await.unwrap();

        assert_eq!(output.dimension, 3);
        assert!(output.vectors.iter().all(|v| v.len() == 3));
        assert_eq!(output.degraded, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_non_finite_vector_is_degraded() {
        #[derive(Debug)]
        struct Unstable;

        #[async_trait::async_trait]
        impl EmbeddingProvider for Unstable {
            fn provider_name(&self) -> &str {
                "unstable"
            }
            fn model_name(&self) -> &str {
                "unstable"
            }
            fn dimensions(&self) -> usize {
                4
            }
            async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
                match text {
                    "overflow" => Ok(vec![f32::NAN, 0.0, 0.0, 0.0]),
                    "infinite" => Ok(vec![0.0, f32::INFINITY, 0.0, 0.0]),
                    _ => Ok(vec![0.0, 0.0, 1.0, 0.0]),
                }
            }
        }

        let generator = EmbeddingGenerator::new(Arc::new(Unstable), options(None, 500));
        let input = vec![
            "stable".to_string(),
            "overflow".to_string(),
            "infinite".to_string(),
        ];
        let output = generator.generate(&input).await.unwrap();

        assert_eq!(output.degraded, vec![1, 2]);
        assert_eq!(output.vectors[1], vec![0.0; 4]);
        assert_eq!(output.vectors[2], vec![0.0; 4]);
        assert!(output.vectors.iter().flatten().all(|x| x.is_finite()));
    }

    #[tokio::test]
    async fn test_resume_retries_checkpointed_placeholders() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        let input = texts(3);

        let first = EmbeddingGenerator::new(
            Arc::new(FlakyProvider::new(8, vec![1])),
            options(Some(path.clone()), 500),
        )
        .generate(&input)
        .await
        .unwrap();
        assert_eq!(first.degraded, vec![1]);

        let provider = Arc::new(FlakyProvider::new(8, vec![]));
        let second = EmbeddingGenerator::new(provider.clone(), options(Some(path.clone()), 500))
            .generate(&input)
            .await
            .unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.resumed, 3);
        assert_eq!(second.retried, 1);
        assert!(second.degraded.is_empty());

        let expected = MockProvider::new("flaky", 8).embed(&input[1]).await.unwrap();
        assert_eq!(second.vectors[1], expected);
        assert_eq!(Checkpoint::load(&path).unwrap().unwrap().embeddings[1], expected);
    }

    #[tokio::test]
    async fn test_resume_keeps_placeholder_when_retry_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        let input = texts(3);

        EmbeddingGenerator::new(
            Arc::new(FlakyProvider::new(8, vec![2])),
            options(Some(path.clone()), 500),
        )
        .generate(&input)
        .await
        .unwrap();

        let output = EmbeddingGenerator::new(
            Arc::new(FlakyProvider::new(8, vec![0])),
            options(Some(path), 500),
        )
        .generate(&input)
        .await
        .unwrap();

        assert_eq!(output.retried, 0);
        assert_eq!(output.degraded, vec![2]);
        assert_eq!(output.vectors[2], vec![0.0; 8]);
    }

    #[tokio::test]
    async fn test_inconsistent_dimensions_are_fatal() {
        #[derive(Debug)]
        struct Drifting(AtomicUsize);

        #[async_trait::async_trait]
        impl EmbeddingProvider for Drifting {
            fn provider_name(&self) -> &str {
                "drifting"
            }
            fn model_name(&self) -> &str {
                "drifting"
            }
            fn dimensions(&self) -> usize {
                4
            }
            async fn embed(&self, _text: &str) -> AppResult<Vec<f32>> {
                let call = self.0.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1.0; 4 + call])
            }
        }

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        let generator = EmbeddingGenerator::new(
            Arc::new(Drifting(AtomicUsize::new(0))),
            options(Some(path.clone()), 500),
        );

        let result = generator.generate(&texts(3)).await;
        assert!(matches!(
            result,
            Err(AppError::DimensionMismatch {
                expected: 4,
                actual: 5
            })
        ));
        assert_eq!(Checkpoint::load(&path).unwrap().unwrap().len(), 1);
    }
}
