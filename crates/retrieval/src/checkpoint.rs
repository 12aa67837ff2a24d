//! Embedding checkpoints.
//!
//! A checkpoint is the full list of embeddings completed so far, written as
//! `{"embeddings": [[...], ...]}` and replaced wholesale on every save. Each
//! position may also carry a content key (SHA-256 of the document text) and
//! the file records the model that produced it. Keys let a resumed run detect
//! the point where the current corpus diverges from the checkpointed one;
//! files without keys are resumed by position only.

use crate::persistence::write_atomic;
use litsearch_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Persisted embedding progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Completed embeddings, `embeddings[i]` belongs to document `i`
    pub embeddings: Vec<Vec<f32>>,

    /// Content key per completed embedding (may be empty for older files)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,

    /// Model that produced the embeddings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Checkpoint {
    /// Load a checkpoint, returning `None` if the file does not exist.
    pub fn load(path: &Path) -> AppResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content).map_err(|e| {
            AppError::Serialization(format!("Failed to parse checkpoint {:?}: {}", path, e))
        })?;

        if !checkpoint.keys.is_empty() && checkpoint.keys.len() != checkpoint.embeddings.len() {
            return Err(AppError::Serialization(format!(
                "Checkpoint {:?} has {} keys for {} embeddings",
                path,
                checkpoint.keys.len(),
                checkpoint.embeddings.len()
            )));
        }

        Ok(Some(checkpoint))
    }

    /// Write the checkpoint atomically, replacing any previous file.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_vec(self)?;
        write_atomic(path, &json)
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Number of leading embeddings that can be reused for `texts`.
    ///
    /// With keys, this is the length of the prefix whose keys match the
    /// current texts. Without keys, it is the checkpoint length capped at the
    /// corpus length.
    pub fn reusable_prefix(&self, texts: &[String]) -> usize {
        let limit = self.embeddings.len().min(texts.len());

        if self.keys.is_empty() {
            return limit;
        }

        self.keys
            .iter()
            .zip(texts)
            .take(limit)
            .take_while(|(key, text)| **key == content_key(text))
            .count()
    }

    /// Drop everything from position `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        self.embeddings.truncate(len);
        self.keys.truncate(len);
    }

    /// Give a positional checkpoint keys for the texts it is assumed to cover.
    pub fn adopt_keys(&mut self, texts: &[String]) {
        if self.keys.is_empty() {
            self.keys = texts
                .iter()
                .take(self.embeddings.len())
                .map(|text| content_key(text))
                .collect();
        }
    }

    /// Append one completed embedding with its content key.
    pub fn push(&mut self, embedding: Vec<f32>, key: String) {
        self.embeddings.push(embedding);
        self.keys.push(key);
    }
}

/// Content key for a document text.
pub fn content_key(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn keyed(items: &[&str]) -> Checkpoint {
        let mut checkpoint = Checkpoint::default();
        for (i, text) in items.iter().enumerate() {
            checkpoint.push(vec![i as f32, 1.0], content_key(text));
        }
        checkpoint
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(Checkpoint::load(&temp.path().join("cp.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cp.json");

        let mut checkpoint = keyed(&["a", "b"]);
        checkpoint.model = Some("mock".to_string());
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn test_legacy_format_without_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cp.json");
        fs::write(&path, r#"{"embeddings": [[0.5, 0.5], [1.0, 0.0]]}"#).unwrap();

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.keys.is_empty());
        assert_eq!(loaded.reusable_prefix(&texts(&["x", "y", "z"])), 2);
        assert_eq!(loaded.reusable_prefix(&texts(&["x"])), 1);
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cp.json");

        keyed(&["a", "b", "c"]).save(&path).unwrap();
        keyed(&["a"]).save(&path).unwrap();

        assert_eq!(Checkpoint::load(&path).unwrap().unwrap().len(), 1);
        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_reusable_prefix_stops_at_changed_text() {
        let checkpoint = keyed(&["a", "b", "c"]);
        assert_eq!(checkpoint.reusable_prefix(&texts(&["a", "b", "c", "d"])), 3);
        assert_eq!(checkpoint.reusable_prefix(&texts(&["a", "X", "c"])), 1);
        assert_eq!(checkpoint.reusable_prefix(&texts(&["new", "a", "b"])), 0);
    }

    #[test]
    fn test_adopt_keys_on_positional_checkpoint() {
        let mut checkpoint = Checkpoint {
            embeddings: vec![vec![1.0], vec![2.0]],
            ..Default::default()
        };
        checkpoint.adopt_keys(&texts(&["a", "b", "c"]));

        assert_eq!(checkpoint.keys, vec![content_key("a"), content_key("b")]);
    }

    #[test]
    fn test_key_count_mismatch_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cp.json");
        fs::write(&path, r#"{"embeddings": [[1.0], [2.0]], "keys": ["k"]}"#).unwrap();

        assert!(matches!(
            Checkpoint::load(&path),
            Err(AppError::Serialization(_))
        ));
    }

    #[test]
    fn test_content_key_is_stable_hex() {
        let key = content_key("alpha");
        assert_eq!(key.len(), 64);
        assert_eq!(key, content_key("alpha"));
        assert_ne!(key, content_key("beta"));
    }
}
