//! Mock embedding provider using trigram-based content-aware embeddings.

use crate::embeddings::provider::EmbeddingProvider;
use litsearch_core::AppResult;
use std::collections::{BTreeMap, HashSet};

const STOP_WORDS: [&str; 33] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "we",
];

/// Offline provider for tests and development.
///
/// Produces deterministic, content-dependent vectors from word and character
/// trigram hashes. Texts sharing vocabulary score higher against each other,
/// which is enough to exercise retrieval end to end without a model server.
#[derive(Debug)]
pub struct MockProvider {
    model: String,
    dimensions: usize,
}

impl MockProvider {
    pub fn new(model: &str, dimensions: usize) -> Self {
        Self {
            model: model.to_string(),
            dimensions,
        }
    }

    fn generate_mock_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();
        let lower = text.to_lowercase();

        // Ordered so the float sums below always run in the same order
        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let slot = (hash(&trigram, 37) as usize) % self.dimensions;
                embedding[slot] += (*freq as f32).sqrt();
            }

            let slot = (hash(word, 31) as usize) % self.dimensions;
            embedding[slot] += *freq as f32;
        }

        crate::vector::normalize_l2(&mut embedding);
        embedding
    }
}

fn hash(s: &str, multiplier: u64) -> u64 {
    s.bytes().fold(0u64, |acc, b| {
        acc.wrapping_mul(multiplier).wrapping_add(u64::from(b))
    })
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.generate_mock_embedding(text))
    }
}
