//! Flat (exhaustive) inner-product index.
//!
//! Vectors are stored row-major in one contiguous buffer. Search scores every
//! row against the query and keeps the best `k`, so results are exact and
//! deterministic: descending score, ties broken by ascending row.
//!
//! Native file format (all integers little-endian):
//!
//! | bytes | field                         |
//! |-------|-------------------------------|
//! | 4     | magic `LSFX`                  |
//! | 4     | format version (`u32`)        |
//! | 4     | dimension (`u32`)             |
//! | 8     | vector count (`u64`)          |
//! | 4·d·n | rows as `f32`                 |

use crate::vector::dot;
use litsearch_core::{AppError, AppResult};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

const INDEX_MAGIC: [u8; 4] = *b"LSFX";
const INDEX_FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 20;

/// How the scoring scan is executed.
#[derive(Clone, Default)]
pub enum SearchBackend {
    /// Score rows one after another on the calling thread
    #[default]
    Sequential,

    /// Score rows on a dedicated worker pool
    Parallel(Arc<rayon::ThreadPool>),
}

impl SearchBackend {
    /// Create the accelerated backend.
    ///
    /// `threads` of `None` lets the pool size itself to the machine.
    pub fn accelerated(threads: Option<usize>) -> AppResult<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("litsearch-search-{}", i));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }

        let pool = builder
            .build()
            .map_err(|e| AppError::AccelerationUnavailable(e.to_string()))?;

        Ok(SearchBackend::Parallel(Arc::new(pool)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SearchBackend::Sequential => "sequential",
            SearchBackend::Parallel(_) => "parallel",
        }
    }
}

impl fmt::Debug for SearchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchBackend::Sequential => write!(f, "Sequential"),
            SearchBackend::Parallel(pool) => {
                write!(f, "Parallel({} threads)", pool.current_num_threads())
            }
        }
    }
}

/// Exact nearest-neighbour index scored by inner product.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dimension: usize,
    data: Vec<f32>,
    backend: SearchBackend,
}

impl FlatIpIndex {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            backend: SearchBackend::Sequential,
        }
    }

    pub fn with_backend(mut self, backend: SearchBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn set_backend(&mut self, backend: SearchBackend) {
        self.backend = backend;
    }

    pub fn backend(&self) -> &SearchBackend {
        &self.backend
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row `row` of the index, if present.
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Append vectors. Rows are numbered in insertion order.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> AppResult<()> {
        if self.dimension == 0 {
            return Err(AppError::DimensionMismatch {
                expected: 0,
                actual: vectors.first().map(Vec::len).unwrap_or(0),
            });
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    /// Return up to `k` `(row, score)` pairs, best first.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = match &self.backend {
            SearchBackend::Sequential => self
                .data
                .chunks_exact(self.dimension)
                .map(|row| dot(query, row))
                .enumerate()
                .collect(),
            SearchBackend::Parallel(pool) => pool.install(|| {
                self.data
                    .par_chunks_exact(self.dimension)
                    .map(|row| dot(query, row))
                    .enumerate()
                    .collect()
            }),
        };

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank);

        Ok(scored)
    }

    /// Serialize to the native binary format.
    pub fn to_bytes(&self) -> AppResult<Vec<u8>> {
        let dimension = u32::try_from(self.dimension).map_err(|_| {
            AppError::IndexCorrupt(format!("dimension {} is too large", self.dimension))
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(&INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&dimension.to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Ok(bytes)
    }

    /// Deserialize from the native binary format. The result uses the
    /// sequential backend.
    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(AppError::IndexCorrupt(format!(
                "index file is {} bytes, shorter than its header",
                bytes.len()
            )));
        }

        if bytes[0..4] != INDEX_MAGIC {
            return Err(AppError::IndexCorrupt("bad index magic".to_string()));
        }

        let version = read_u32(&bytes[4..8]);
        if version != INDEX_FORMAT_VERSION {
            return Err(AppError::IndexCorrupt(format!(
                "unsupported index format version {}",
                version
            )));
        }

        let dimension = read_u32(&bytes[8..12]) as usize;
        let count = read_u64(&bytes[12..20]);

        let body = &bytes[HEADER_LEN..];
        let expected = usize::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(dimension))
            .and_then(|n| n.checked_mul(4));
        if expected != Some(body.len()) || (dimension == 0 && count > 0) {
            return Err(AppError::IndexCorrupt(format!(
                "header declares {} vectors of dimension {}, body has {} bytes",
                count,
                dimension,
                body.len()
            )));
        }

        let data = body
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            dimension,
            data,
            backend: SearchBackend::Sequential,
        })
    }
}

/// Best score first, then lowest row. NaN scores sort after every number.
fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    match (a.1.is_nan(), b.1.is_nan()) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => b.1.total_cmp(&a.1),
    }
    .then(a.0.cmp(&b.0))
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn read_u64(b: &[u8]) -> u64 {
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(rows: &[Vec<f32>]) -> FlatIpIndex {
        let mut index = FlatIpIndex::new(rows[0].len());
        index.add(rows).unwrap();
        index
    }

    #[test]
    fn test_add_and_len() {
        let index = index_of(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.vector(2), Some(&[0.6, 0.8][..]));
        assert_eq!(index.vector(3), None);
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = FlatIpIndex::new(3);
        let result = index.add(&[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
        assert!(matches!(
            result,
            Err(AppError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_orders_by_descending_score() {
        let index = index_of(&[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.6, 0.8]]);
        let hits = index.search(&[1.0, 0.0], 3).unwrap();

        let rows: Vec<usize> = hits.iter().map(|(row, _)| *row).collect();
        assert_eq!(rows, vec![1, 2, 0]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_ties_break_by_row() {
        let index = index_of(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]]);
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 2);
    }

    #[test]
    fn test_nan_row_ranks_last() {
        let index = index_of(&[vec![1.0, 0.0], vec![f32::NAN, 0.0], vec![0.0, 0.0]]);

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let rows: Vec<usize> = hits.iter().map(|(row, _)| *row).collect();
        assert_eq!(rows, vec![0, 2, 1]);

        let top = index.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(top, vec![(0, 1.0)]);
    }

    #[test]
    fn test_search_k_larger_than_len() {
        let index = index_of(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(index.search(&[1.0, 0.0], 100).unwrap().len(), 2);
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = index_of(&[vec![1.0, 0.0]]);
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(AppError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_parallel_backend_matches_sequential() {
        let rows: Vec<Vec<f32>> = (0..64)
            .map(|i| {
                let x = i as f32;
                vec![x.sin(), x.cos(), (x * 0.3).sin()]
            })
            .collect();
        let sequential = index_of(&rows);
        let parallel = index_of(&rows).with_backend(SearchBackend::accelerated(Some(2)).unwrap());
        assert_eq!(parallel.backend().name(), "parallel");

        let query = [0.3, -0.2, 0.9];
        assert_eq!(
            sequential.search(&query, 10).unwrap(),
            parallel.search(&query, 10).unwrap()
        );
    }

    #[test]
    fn test_bytes_round_trip() {
        let index = index_of(&[vec![0.25, -1.5, 3.0], vec![0.0, 0.0, 0.0]]);
        let restored = FlatIpIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();

        assert_eq!(restored.dimension(), 3);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.vector(0), index.vector(0));
        assert_eq!(restored.vector(1), index.vector(1));
    }

    #[test]
    fn test_from_bytes_rejects_truncated_body() {
        let index = index_of(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let mut bytes = index.to_bytes().unwrap();
        bytes.truncate(bytes.len() - 4);

        assert!(matches!(
            FlatIpIndex::from_bytes(&bytes),
            Err(AppError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_bad_magic() {
        let mut bytes = index_of(&[vec![1.0]]).to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            FlatIpIndex::from_bytes(&bytes),
            Err(AppError::IndexCorrupt(_))
        ));
    }
}
