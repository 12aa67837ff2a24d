//! Query command handler.

use clap::Args;
use litsearch_core::{config::AppConfig, AppResult};
use litsearch_retrieval::{create_provider, open_retriever, read_document_text};
use std::path::Path;

const SNIPPET_CHARS: usize = 240;

/// Retrieve the abstracts most similar to a query
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Query text
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Number of abstracts to retrieve (default: configured top-k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Include abstract text read from the corpus directory
    #[arg(long)]
    pub with_text: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let query = self.query.join(" ");
        let k = self.top_k.unwrap_or(config.top_k);

        tracing::info!("Executing query command (k={})", k);

        let provider = create_provider(&config.embedding)?;
        let retriever = open_retriever(config, provider)?;
        let results = retriever.retrieve(&query, k).await?;

        let mut texts = Vec::with_capacity(results.len());
        if self.with_text {
            for hit in &results {
                texts.push(text_for(&config.corpus_dir, &hit.id));
            }
        }

        if self.json {
            let items: Vec<serde_json::Value> = results
                .iter()
                .enumerate()
                .map(|(i, hit)| {
                    let mut item = serde_json::json!({
                        "rank": i + 1,
                        "id": hit.id,
                        "score": hit.score,
                    });
                    if let Some(Some(text)) = texts.get(i) {
                        item["text"] = serde_json::Value::String(text.clone());
                    }
                    item
                })
                .collect();

            let output = serde_json::json!({
                "query": query,
                "k": k,
                "results": items,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if results.is_empty() {
            println!("No results (the index is empty)");
        } else {
            for (i, hit) in results.iter().enumerate() {
                println!("{:>3}. {}  (score {:.4})", i + 1, hit.id, hit.score);
                if let Some(Some(text)) = texts.get(i) {
                    println!("     {}", snippet(text));
                }
            }
        }

        Ok(())
    }
}

/// Abstract text for a hit; an unreadable record only loses its text.
fn text_for(corpus_dir: &Path, id: &str) -> Option<String> {
    match read_document_text(corpus_dir, id) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Cannot read text for {} from {:?}: {}", id, corpus_dir, e);
            None
        }
    }
}

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
    format!("{}...", cut.trim_end())
}
