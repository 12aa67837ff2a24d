//! Configuration management for litsearch.
//!
//! Configuration is resolved once, at the program entry point, from these
//! sources in increasing order of precedence:
//! - Built-in defaults
//! - A YAML config file (`litsearch.yaml` in the working directory, or `--config`)
//! - Environment variables (`LITSEARCH_*`, `OLLAMA_MODEL`, `OLLAMA_URL`)
//! - Command-line flags
//!
//! The resulting [`AppConfig`] is passed by reference into every component.
//! Nothing in the retrieval core reads the environment on its own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "litsearch.yaml";

/// File name of the embedding checkpoint inside the index directory.
pub const CHECKPOINT_FILE_NAME: &str = "embedding_checkpoint.json";

/// Embedding providers the retrieval crate knows how to construct.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config file the values were merged from, if any
    pub config_file: Option<PathBuf>,

    /// Directory of one-document-per-file JSON records
    pub corpus_dir: PathBuf,

    /// Directory holding the index, identifier map and manifest
    pub index_dir: PathBuf,

    /// Explicit checkpoint path (defaults to `<index_dir>/embedding_checkpoint.json`)
    pub checkpoint_path: Option<PathBuf>,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Default number of results per query
    pub top_k: usize,

    /// Use the accelerated (parallel) search backend when available
    pub accelerate: bool,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSettings {
    /// Provider name: "ollama" or "mock"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Output dimensionality of the model
    pub dimensions: usize,

    /// Provider base URL
    pub endpoint: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Fixed delay between provider calls in milliseconds
    pub request_delay_ms: u64,

    /// Persist the checkpoint every N completed embeddings
    pub checkpoint_every: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "mxbai-embed-large".to_string(),
            dimensions: 1024,
            endpoint: "http://localhost:11434".to_string(),
            timeout_secs: 30,
            request_delay_ms: 100,
            checkpoint_every: 500,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    corpus: Option<CorpusSection>,
    index: Option<IndexSection>,
    embedding: Option<EmbeddingSection>,
    retrieval: Option<RetrievalSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CorpusSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexSection {
    path: Option<String>,
    accelerate: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    request_delay_ms: Option<u64>,
    checkpoint_every: Option<usize>,
    checkpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalSection {
    top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

/// Values supplied on the command line. `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub corpus_dir: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,
    pub checkpoint_path: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub dimensions: Option<usize>,
    pub top_k: Option<usize>,
    pub accelerate: Option<bool>,
    pub log_level: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            corpus_dir: PathBuf::from("data/abstracts"),
            index_dir: PathBuf::from("data/index"),
            checkpoint_path: None,
            embedding: EmbeddingSettings::default(),
            top_k: 15,
            accelerate: true,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `LITSEARCH_CORPUS_DIR`: Corpus directory
    /// - `LITSEARCH_INDEX_DIR`: Index directory
    /// - `LITSEARCH_CHECKPOINT`: Checkpoint file path
    /// - `LITSEARCH_PROVIDER`: Embedding provider
    /// - `LITSEARCH_MODEL` (or `OLLAMA_MODEL`): Embedding model
    /// - `LITSEARCH_DIMENSIONS`: Embedding dimensionality
    /// - `LITSEARCH_TOP_K`: Default top-k
    /// - `LITSEARCH_ACCELERATE`: `true`/`false`
    /// - `OLLAMA_URL`: Ollama endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use litsearch_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Index: {:?}", config.index_dir);
    /// ```
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut config = Self::default();

        let config_path = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                Some(path.to_path_buf())
            }
            None => {
                let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
                candidate.exists().then_some(candidate)
            }
        };

        if let Some(path) = config_path {
            tracing::debug!("Merging config file {:?}", path);
            config.merge_yaml(&path)?;
            config.config_file = Some(path);
        }

        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        self.merge_file(file);
        Ok(())
    }

    fn merge_file(&mut self, file: ConfigFile) {
        if let Some(corpus) = file.corpus {
            if let Some(path) = corpus.path {
                self.corpus_dir = PathBuf::from(path);
            }
        }

        if let Some(index) = file.index {
            if let Some(path) = index.path {
                self.index_dir = PathBuf::from(path);
            }
            if let Some(accelerate) = index.accelerate {
                self.accelerate = accelerate;
            }
        }

        if let Some(embedding) = file.embedding {
            let settings = &mut self.embedding;
            if let Some(provider) = embedding.provider {
                settings.provider = provider;
            }
            if let Some(model) = embedding.model {
                settings.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                settings.dimensions = dimensions;
            }
            if let Some(endpoint) = embedding.endpoint {
                settings.endpoint = endpoint;
            }
            if let Some(timeout) = embedding.timeout_secs {
                settings.timeout_secs = timeout;
            }
            if let Some(delay) = embedding.request_delay_ms {
                settings.request_delay_ms = delay;
            }
            if let Some(every) = embedding.checkpoint_every {
                settings.checkpoint_every = every;
            }
            if let Some(checkpoint) = embedding.checkpoint {
                self.checkpoint_path = Some(PathBuf::from(checkpoint));
            }
        }

        if let Some(retrieval) = file.retrieval {
            if let Some(top_k) = retrieval.top_k {
                self.top_k = top_k;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }
    }

    /// Apply environment overrides read through `lookup`.
    fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("LITSEARCH_CORPUS_DIR") {
            self.corpus_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LITSEARCH_INDEX_DIR") {
            self.index_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("LITSEARCH_CHECKPOINT") {
            self.checkpoint_path = Some(PathBuf::from(path));
        }
        if let Some(provider) = lookup("LITSEARCH_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Some(model) = lookup("LITSEARCH_MODEL").or_else(|| lookup("OLLAMA_MODEL")) {
            self.embedding.model = model;
        }
        if let Some(value) = lookup("LITSEARCH_DIMENSIONS") {
            self.embedding.dimensions = parse_env("LITSEARCH_DIMENSIONS", &value)?;
        }
        if let Some(value) = lookup("LITSEARCH_TOP_K") {
            self.top_k = parse_env("LITSEARCH_TOP_K", &value)?;
        }
        if let Some(value) = lookup("LITSEARCH_ACCELERATE") {
            self.accelerate = parse_bool("LITSEARCH_ACCELERATE", &value)?;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.endpoint = url;
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }
        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Flags take precedence over the config file and environment.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(dir) = overrides.corpus_dir {
            self.corpus_dir = dir;
        }
        if let Some(dir) = overrides.index_dir {
            self.index_dir = dir;
        }
        if let Some(path) = overrides.checkpoint_path {
            self.checkpoint_path = Some(path);
        }
        if let Some(provider) = overrides.provider {
            self.embedding.provider = provider;
        }
        if let Some(model) = overrides.model {
            self.embedding.model = model;
        }
        if let Some(dimensions) = overrides.dimensions {
            self.embedding.dimensions = dimensions;
        }
        if let Some(top_k) = overrides.top_k {
            self.top_k = top_k;
        }
        if let Some(accelerate) = overrides.accelerate {
            self.accelerate = accelerate;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = Some(level);
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }
        if overrides.log_json {
            self.log_json = true;
        }

        self
    }

    /// Resolved checkpoint location.
    pub fn checkpoint_file(&self) -> PathBuf {
        self.checkpoint_path
            .clone()
            .unwrap_or_else(|| self.index_dir.join(CHECKPOINT_FILE_NAME))
    }

    /// Validate the resolved configuration.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(AppError::Config("Embedding model must not be empty".to_string()));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be at least 1".to_string(),
            ));
        }

        if self.embedding.checkpoint_every == 0 {
            return Err(AppError::Config(
                "Checkpoint interval must be at least 1".to_string(),
            ));
        }

        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        AppError::Config(format!("Invalid value for {}: {:?}", key, value))
    })
}

fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "Invalid value for {}: {:?}",
            key, value
        ))),
    }
}
