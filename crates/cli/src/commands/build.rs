//! Build command handler.
//!
//! Embeds the corpus and writes the index, id map and manifest.

use clap::Args;
use litsearch_core::{config::AppConfig, AppError, AppResult};
use litsearch_retrieval::{build_index, create_provider, ProgressEvent, ProgressReporter};
use std::sync::Arc;

/// Embed the corpus and write the index
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Do not print progress lines to stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Output the build report as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command");

        let provider = create_provider(&config.embedding)?;

        let progress = if self.quiet {
            ProgressReporter::noop()
        } else {
            ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple())
            }))
        };

        let report = match build_index(config, provider, progress).await {
            Ok(report) => report,
            Err(AppError::CorpusEmpty { path }) => {
                println!("Nothing to index: no abstracts with text in {}", path.display());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "Indexed {} documents ({} dimensions, {} backend) in {:.2}s",
                report.documents, report.dimension, report.backend, report.duration_secs
            );
            if report.resumed > 0 {
                println!("  Resumed: {} embeddings from checkpoint", report.resumed);
            }
            if report.retried > 0 {
                println!(
                    "  Retried: {} previously failed documents now embedded",
                    report.retried
                );
            }
            if !report.degraded.is_empty() {
                println!(
                    "  Degraded: {} documents could not be embedded and carry zero vectors",
                    report.degraded.len()
                );
            }
            println!("  Index:  {}", report.index_path.display());
            println!("  Id map: {}", report.id_map_path.display());
        }

        Ok(())
    }
}
