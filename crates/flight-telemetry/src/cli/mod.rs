//! Command-line interface for flight-telemetry.
//!
//! This module provides the CLI structure for the `flightsim` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, FleetCommand, HistoryCommand, PruneCommand, RunCommand, StatusCommand,
};

use crate::logging::Verbosity;

/// flightsim - Simulated flight fleet telemetry
///
/// Generates periodic altitude, speed, and temperature readings for a fleet
/// of simulated flights, persists them, and answers latest and history
/// queries.
#[derive(Debug, Parser)]
#[command(name = "flightsim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the simulation until Ctrl-C or the given duration
    Run(RunCommand),

    /// Show the most recent readings of one flight
    History(HistoryCommand),

    /// List the simulated fleet
    Fleet(FleetCommand),

    /// Show store statistics
    Status(StatusCommand),

    /// Delete old readings
    Prune(PruneCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
