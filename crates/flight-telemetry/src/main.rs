//! `flightsim` - CLI for flight-telemetry
//!
//! This binary runs the telemetry simulation and answers history, fleet, and
//! store queries against the database it writes.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use flight_telemetry::cli::{
    Cli, Command, ConfigCommand, HistoryCommand, PruneCommand, RunCommand,
};
use flight_telemetry::{
    init_logging, Config, Fleet, HistoryPoint, LatestCache, QueryService, Reading,
    SimulationScheduler, SqliteStore, TelemetryGenerator,
};

/// Readings shown in the snapshot printed when a run ends.
const SUMMARY_ROWS: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Run(cmd) => handle_run(config, &cmd).await,
        Command::History(cmd) => handle_history(&config, &cmd).await,
        Command::Fleet(cmd) => handle_fleet(&config, cmd.json),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Prune(cmd) => handle_prune(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = config.database_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("opening telemetry store at {}", path.display()))?
        .with_timeout(config.operation_timeout())?;
    Ok(store)
}

async fn handle_run(mut config: Config, cmd: &RunCommand) -> anyhow::Result<()> {
    if let Some(interval_ms) = cmd.interval_ms {
        config.simulation.tick_interval_ms = interval_ms;
    }
    if let Some(fleet_size) = cmd.fleet_size {
        config.simulation.fleet_size = fleet_size;
    }
    if cmd.seed.is_some() {
        config.simulation.seed = cmd.seed;
    }
    config.validate()?;

    let store = open_store(&config)?;
    let cache = LatestCache::new();
    let generator = config
        .simulation
        .seed
        .map_or_else(TelemetryGenerator::new, TelemetryGenerator::with_seed);
    let scheduler = SimulationScheduler::new(
        Fleet::generate(config.simulation.fleet_size),
        generator,
        Arc::new(store.clone()),
        cache.clone(),
        config.tick_interval(),
    );

    info!(
        flights = config.simulation.fleet_size,
        interval_ms = config.simulation.tick_interval_ms,
        database = %store.path().display(),
        "simulation started"
    );
    let handle = scheduler.spawn();

    match cmd.duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                result = tokio::signal::ctrl_c() => result?,
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    let status = handle.shutdown().await?;
    store.close();

    println!("Simulation stopped");
    println!("------------------");
    println!("Cycles persisted: {}", status.cycles_completed);
    println!("Cycles failed:    {}", status.cycles_failed);
    println!("Ticks skipped:    {}", status.cycles_skipped);
    println!("Flights cached:   {}", cache.len());

    let mut latest = QueryService::new(cache, Arc::new(store)).get_latest();
    latest.sort_by(|a, b| a.flight_id.cmp(&b.flight_id));
    if !latest.is_empty() {
        println!();
        print_readings(latest.iter().take(SUMMARY_ROWS));
        if latest.len() > SUMMARY_ROWS {
            println!("... and {} more", latest.len() - SUMMARY_ROWS);
        }
    }
    Ok(())
}

async fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let service = QueryService::new(LatestCache::new(), Arc::new(store));
    let history = service.get_history(&cmd.flight_id, cmd.limit).await?;

    if cmd.json {
        let points: Vec<HistoryPoint> = history.iter().map(HistoryPoint::from).collect();
        println!("{}", serde_json::to_string_pretty(&points)?);
    } else if history.is_empty() {
        let fleet = Fleet::generate(config.simulation.fleet_size);
        if fleet.get(&cmd.flight_id).is_some() {
            println!("No readings for {}", cmd.flight_id);
        } else {
            println!(
                "No readings for {} (not in the configured fleet of {})",
                cmd.flight_id,
                fleet.len()
            );
        }
    } else {
        print_readings(history.iter());
    }
    Ok(())
}

fn handle_fleet(config: &Config, json: bool) -> anyhow::Result<()> {
    let fleet = Fleet::generate(config.simulation.fleet_size);
    if json {
        let flights: Vec<_> = fleet.iter().collect();
        println!("{}", serde_json::to_string_pretty(&flights)?);
    } else {
        for flight in &fleet {
            println!("{:<8} {}", flight.flight_id, flight.flight_name);
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": store.path(),
            "total_readings": stats.total_readings,
            "flights": stats.flights,
            "oldest_reading": stats.oldest_reading,
            "newest_reading": stats.newest_reading,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("flightsim status");
        println!("----------------");
        println!("Database:       {}", store.path().display());
        println!("Readings:       {}", stats.total_readings);
        println!("Flights:        {}", stats.flights);
        if let Some(oldest) = stats.oldest_reading {
            println!("Oldest reading: {}", oldest.to_rfc3339());
        }
        if let Some(newest) = stats.newest_reading {
            println!("Newest reading: {}", newest.to_rfc3339());
        }
        println!("Size:           {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_prune(config: &Config, cmd: &PruneCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let removed = store.prune_older_than(chrono::Duration::days(i64::from(cmd.older_than_days)))?;
    println!(
        "Removed {removed} readings older than {} days",
        cmd.older_than_days
    );
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:     {}", config.database_path().display());
                println!(
                    "  Operation timeout: {} ms",
                    config.storage.operation_timeout_ms
                );
                println!();
                println!("[Simulation]");
                println!(
                    "  Tick interval:     {} ms",
                    config.simulation.tick_interval_ms
                );
                println!("  Fleet size:        {}", config.simulation.fleet_size);
                match config.simulation.seed {
                    Some(seed) => println!("  Seed:              {seed}"),
                    None => println!("  Seed:              (random)"),
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn print_readings<'a>(readings: impl Iterator<Item = &'a Reading>) {
    println!(
        "{:<8} {:<12} {:>10} {:>8} {:>8}  TIMESTAMP",
        "FLIGHT", "NAME", "ALT (m)", "KM/H", "TEMP C"
    );
    for r in readings {
        println!(
            "{:<8} {:<12} {:>10.2} {:>8.2} {:>8.2}  {}",
            r.flight_id,
            r.flight_name,
            r.altitude,
            r.speed,
            r.temperature,
            r.timestamp.to_rfc3339()
        );
    }
}
