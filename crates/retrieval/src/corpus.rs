//! Corpus loading from a directory of JSON document records.
//!
//! Each `*.json` file holds one record `{"id": ..., "text": ...}`. The
//! `pmid`/`abstract` field names written by the PubMed fetcher are accepted
//! too. Files are enumerated in lexicographic file-name order so that the
//! position of a document is stable between runs; checkpoint resumption
//! depends on it.

use crate::types::Document;
use litsearch_core::{AppError, AppResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// On-disk document record. Both fields are optional so that incomplete
/// records can be skipped instead of failing the whole load.
#[derive(Debug, Deserialize)]
struct DocumentRecord {
    #[serde(default, alias = "pmid")]
    id: Option<serde_json::Value>,

    #[serde(default, alias = "abstract")]
    text: Option<String>,
}

impl DocumentRecord {
    fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Ordered, equal-length texts and ids ready for embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    /// Document texts, trimmed
    pub texts: Vec<String>,

    /// Document ids, `ids[i]` belongs to `texts[i]`
    pub ids: Vec<String>,
}

impl Corpus {
    fn push(&mut self, document: Document) {
        self.ids.push(document.id);
        self.texts.push(document.text);
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Load every document with non-empty text from `dir`.
///
/// Returns [`AppError::CorpusEmpty`] when no document qualifies, including
/// when the directory does not exist yet.
pub fn load_corpus(dir: &Path) -> AppResult<Corpus> {
    if !dir.is_dir() {
        tracing::debug!("Corpus directory {:?} does not exist", dir);
        return Err(AppError::CorpusEmpty {
            path: dir.to_path_buf(),
        });
    }

    let mut corpus = Corpus::default();
    let mut skipped = 0usize;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .follow_links(true)
    {
        let entry = entry.map_err(|e| {
            AppError::Io(std::io::Error::other(format!(
                "Failed to read corpus directory {:?}: {}",
                dir, e
            )))
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() || !is_json(path) {
            continue;
        }

        match read_record(path) {
            Ok(Some(document)) => corpus.push(document),
            Ok(None) => skipped += 1,
            Err(e) => {
                tracing::warn!("Skipping unreadable record {:?}: {}", path, e);
                skipped += 1;
            }
        }
    }

    if corpus.is_empty() {
        return Err(AppError::CorpusEmpty {
            path: dir.to_path_buf(),
        });
    }

    tracing::info!(
        "Loaded {} documents for embedding ({} skipped) from {:?}",
        corpus.len(),
        skipped,
        dir
    );

    Ok(corpus)
}

/// Read the text of document `id` from `<dir>/<id>.json`.
///
/// Returns `Ok(None)` if the file does not exist or holds no text.
pub fn read_document_text(dir: &Path, id: &str) -> AppResult<Option<String>> {
    if id.is_empty() || id.contains(['/', '\\']) || id == ".." {
        return Ok(None);
    }

    let path = dir.join(format!("{}.json", id));
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let record: DocumentRecord = serde_json::from_str(&content)?;
    Ok(record.text.filter(|t| !t.trim().is_empty()))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn read_record(path: &Path) -> AppResult<Option<Document>> {
    let content = fs::read_to_string(path)?;
    let record: DocumentRecord = serde_json::from_str(&content)?;

    let text = match record.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            tracing::debug!("Skipping {:?}: empty text", path);
            return Ok(None);
        }
    };

    let Some(id) = record.id_string() else {
        tracing::warn!("Skipping {:?}: record has no id", path);
        return Ok(None);
    };

    Ok(Some(Document { id, text }))
}
