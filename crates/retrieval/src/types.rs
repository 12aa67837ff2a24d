//! Retrieval type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A document with non-empty text, as produced by the corpus loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Externally assigned identifier (e.g. a PubMed id)
    pub id: String,

    /// Trimmed document text
    pub text: String,
}

/// One search hit resolved back to its document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Document identifier
    pub id: String,

    /// Inner product of the normalized query and document vectors
    pub score: f32,
}

/// Metadata persisted next to the index so query time can check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Embedding provider used at build time
    pub provider: String,

    /// Embedding model used at build time
    pub model: String,

    /// Vector dimensionality
    pub dimension: usize,

    /// Number of indexed vectors
    pub count: usize,

    /// When the index was written
    pub built_at: DateTime<Utc>,
}

/// Summary of a completed build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    /// Number of documents indexed
    pub documents: usize,

    /// Positions whose embedding failed and carry a zero vector
    pub degraded: Vec<usize>,

    /// Number of embeddings reused from the checkpoint
    pub resumed: usize,

    /// Checkpointed zero placeholders embedded successfully on this run
    #[serde(default)]
    pub retried: usize,

    /// Vector dimensionality
    pub dimension: usize,

    /// Search backend the index was built on
    pub backend: String,

    /// Written index file
    pub index_path: PathBuf,

    /// Written identifier map
    pub id_map_path: PathBuf,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Index directory
    pub index_dir: PathBuf,

    /// Manifest, if one was written
    pub manifest: Option<IndexManifest>,

    /// Number of entries in the identifier map
    pub ids_count: usize,

    /// Size of the index file in bytes
    pub index_size_bytes: u64,

    /// Whether an embedding checkpoint is present
    pub checkpoint_present: bool,
}
