//! Stats command handler.
//!
//! Shows what is currently persisted in the index directory.

use clap::Args;
use litsearch_core::{config::AppConfig, AppResult};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = litsearch_retrieval::stats(config)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Index: {}", stats.index_dir.display());
        println!("  Documents: {}", stats.ids_count);
        println!("  Index size: {} bytes", stats.index_size_bytes);
        match &stats.manifest {
            Some(manifest) => {
                println!("  Provider: {}", manifest.provider);
                println!("  Model: {}", manifest.model);
                println!("  Dimensions: {}", manifest.dimension);
                println!("  Built at: {}", manifest.built_at.to_rfc3339());
            }
            None => println!("  Manifest: (none)"),
        }
        println!(
            "  Checkpoint: {}",
            if stats.checkpoint_present { "present" } else { "none" }
        );

        Ok(())
    }
}
