//! CLI parse: clap types for Folio. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Folio CLI - Parallel chapter generation
#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Research, write and audit multi-chapter documents in parallel")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate every chapter of a plan
    Run {
        /// Document plan (TOML)
        #[arg(long)]
        plan: PathBuf,
        /// Output directory for chapter files
        #[arg(long, default_value = "out")]
        out: PathBuf,
        /// Abort on the first tier with a rejected chapter
        #[arg(long)]
        strict: bool,
        /// OpenAI-compatible base URL
        #[arg(long)]
        endpoint: Option<String>,
        /// Model name
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
        /// API key (falls back to the environment)
        #[arg(long, env = "FOLIO_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Crossref base URL
        #[arg(long)]
        search_endpoint: Option<String>,
        /// Contact address sent to Crossref
        #[arg(long)]
        mailto: Option<String>,
        /// Append progress events to this JSON lines file
        #[arg(long)]
        events: Option<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Check a plan and print its dependency tiers
    Validate {
        /// Document plan (TOML)
        #[arg(long)]
        plan: PathBuf,
    },
}
