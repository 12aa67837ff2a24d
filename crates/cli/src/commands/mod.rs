//! Command handlers for the litsearch CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod build;
pub mod clean;
pub mod query;
pub mod stats;

// Re-export command types for convenience
pub use build::BuildCommand;
pub use clean::CleanCommand;
pub use query::QueryCommand;
pub use stats::StatsCommand;
