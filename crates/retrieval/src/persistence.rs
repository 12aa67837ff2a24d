//! Index persistence.
//!
//! An index directory holds three files:
//! - `vectors.idx`: the flat index in its native binary format
//! - `id_map.json`: JSON array of document ids, `ids[i]` is row `i`
//! - `manifest.json`: provider, model and shape of the build
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! reader never sees a partially written file.

use crate::flat_index::FlatIpIndex;
use crate::types::IndexManifest;
use litsearch_core::{AppError, AppResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const INDEX_FILE_NAME: &str = "vectors.idx";
pub const ID_MAP_FILE_NAME: &str = "id_map.json";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// File locations inside an index directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub index: PathBuf,
    pub id_map: PathBuf,
    pub manifest: PathBuf,
}

impl IndexPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            index: dir.join(INDEX_FILE_NAME),
            id_map: dir.join(ID_MAP_FILE_NAME),
            manifest: dir.join(MANIFEST_FILE_NAME),
        }
    }
}

/// Write the index and its identifier map. Returns `(index_path, id_map_path)`.
pub fn save_index(
    index: &FlatIpIndex,
    ids: &[String],
    paths: &IndexPaths,
) -> AppResult<(PathBuf, PathBuf)> {
    if ids.len() != index.len() {
        return Err(AppError::IndexCorrupt(format!(
            "refusing to save {} ids for {} vectors",
            ids.len(),
            index.len()
        )));
    }

    write_atomic(&paths.index, &index.to_bytes()?)?;
    write_atomic(&paths.id_map, &serde_json::to_vec_pretty(ids)?)?;

    tracing::info!("Index saved to {:?}", paths.index);
    tracing::info!("Id map saved to {:?}", paths.id_map);

    Ok((paths.index.clone(), paths.id_map.clone()))
}

/// Read an index and its identifier map back.
///
/// Fails with [`AppError::IndexNotFound`] if either file is missing and with
/// [`AppError::IndexCorrupt`] if they disagree on the number of rows.
pub fn load_index(index_path: &Path, id_map_path: &Path) -> AppResult<(FlatIpIndex, Vec<String>)> {
    for path in [index_path, id_map_path] {
        if !path.is_file() {
            return Err(AppError::IndexNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    let bytes = fs::read(index_path)?;
    let index = FlatIpIndex::from_bytes(&bytes)?;

    let content = fs::read_to_string(id_map_path)?;
    let ids: Vec<String> = serde_json::from_str(&content).map_err(|e| {
        AppError::IndexCorrupt(format!("id map {:?} is not a JSON string array: {}", id_map_path, e))
    })?;

    if ids.len() != index.len() {
        return Err(AppError::IndexCorrupt(format!(
            "id map has {} entries but index has {} vectors",
            ids.len(),
            index.len()
        )));
    }

    tracing::debug!(
        "Loaded index with {} vectors of dimension {}",
        index.len(),
        index.dimension()
    );

    Ok((index, ids))
}

pub fn save_manifest(manifest: &IndexManifest, path: &Path) -> AppResult<()> {
    write_atomic(path, &serde_json::to_vec_pretty(manifest)?)
}

/// Read the manifest, returning `None` for indexes written without one.
pub fn load_manifest(path: &Path) -> AppResult<Option<IndexManifest>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Replace `path` with `bytes` via a temporary file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;

    Ok(())
}
