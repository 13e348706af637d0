//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// luckydraw: fetch video comments, filter them, and draw winners
#[derive(Parser, Debug)]
#[command(name = "luckydraw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every comment for a video and print them as JSON
    Fetch(FetchArgs),

    /// Load comments, apply filters, and draw winners
    Draw(DrawArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Video identifier (BV id)
    #[arg(long)]
    pub bvid: String,

    /// Write comments to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DrawArgs {
    /// Video identifier to fetch comments for
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    pub bvid: Option<String>,

    /// JSON file with raw comments (use - for stdin)
    #[arg(long, conflicts_with = "bvid")]
    pub input: Option<PathBuf>,

    /// Keywords a comment must contain (comma or space separated)
    #[arg(long)]
    pub keywords: Option<String>,

    /// Minimum commenter level
    #[arg(long)]
    pub min_level: Option<u32>,

    /// Allow several comments from the same author into the pool
    #[arg(long)]
    pub no_dedupe: bool,

    /// Number of winners to draw
    #[arg(long)]
    pub count: Option<usize>,

    /// Seed for a reproducible draw
    #[arg(long)]
    pub seed: Option<u64>,

    /// Rolling animation length in milliseconds
    #[arg(long)]
    pub rolling_ms: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./luckydraw.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
