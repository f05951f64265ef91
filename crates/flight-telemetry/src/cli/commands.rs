//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::service::DEFAULT_HISTORY_LIMIT;

/// Run command arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Stop after this many seconds (runs until Ctrl-C when omitted)
    #[arg(short, long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Override the tick interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Override the number of simulated flights
    #[arg(long, value_name = "N")]
    pub fleet_size: Option<usize>,

    /// Seed the value generator for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Flight identifier (e.g. FL100)
    pub flight_id: String,

    /// Maximum number of readings, newest first
    #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT, allow_negative_numbers = true)]
    pub limit: i64,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Fleet command arguments.
#[derive(Debug, Args)]
pub struct FleetCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Prune command arguments.
#[derive(Debug, Args)]
pub struct PruneCommand {
    /// Delete readings older than this many days
    #[arg(long, value_name = "DAYS")]
    pub older_than_days: u32,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        file: Option<PathBuf>,
    },
}
