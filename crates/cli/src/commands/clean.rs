//! Clean command handler.

use clap::Args;
use litsearch_core::{config::AppConfig, AppResult};

/// Remove the index, id map, manifest and checkpoint
#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clean command for {:?}", config.index_dir);

        let removed = litsearch_retrieval::clean(config)?;

        if removed.is_empty() {
            println!("Nothing to clean in {}", config.index_dir.display());
        } else {
            for path in &removed {
                println!("Removed {}", path.display());
            }
        }

        Ok(())
    }
}
