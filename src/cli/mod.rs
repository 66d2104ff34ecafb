//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "custodian",
    version,
    author = "anicka-net",
    about = "Governance risk scoring for open source dependencies",
    long_about = "Custodian mines a package's commit history and maintainer metadata to score \
                  the risk of abandonment, single-maintainer burnout, and hostile takeover \
                  (the xz-utils pattern), and can replay that score over past months to show \
                  how governance health evolved."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/custodian/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a package's current governance risk
    Score {
        /// Package name (or owner/repo for the github ecosystem)
        package: String,

        /// Package ecosystem (npm, pypi, cargo, rubygems, packagist, nuget, go, github)
        #[arg(short, long, default_value = "npm")]
        ecosystem: String,

        /// Recalculate even if a fresh cached score exists
        #[arg(long)]
        force: bool,

        /// Show the full breakdown in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Replay a package's risk score over past months
    History {
        /// Package name (or owner/repo for the github ecosystem)
        package: String,

        /// Package ecosystem
        #[arg(short, long, default_value = "npm")]
        ecosystem: String,

        /// Number of monthly points to replay
        #[arg(short, long, default_value = "12")]
        months: u32,

        /// Show the series in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Score every package in a discovery file
    Batch {
        /// JSON discovery file: ["eco:name", ...] or [{"name","ecosystem"}, ...]
        file: PathBuf,

        /// Recalculate packages with fresh cached scores too
        #[arg(long)]
        force: bool,

        /// Show all results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Inspect and manage the score cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached packages with their scores
    List,

    /// Remove one package from the cache entirely
    Evict {
        /// Package name
        package: String,

        /// Package ecosystem
        #[arg(short, long, default_value = "npm")]
        ecosystem: String,
    },

    /// Drop the replayed history for a package, keeping its current score
    ClearHistory {
        /// Package name
        package: String,

        /// Package ecosystem
        #[arg(short, long, default_value = "npm")]
        ecosystem: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
