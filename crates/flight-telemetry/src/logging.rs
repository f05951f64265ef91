//! Tracing setup for the `flightsim` binary.
//!
//! Cycle outcomes are logged from [`crate::scheduler`] with structured fields
//! (`readings`, `error`); this module only decides what gets through.

use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Target every directive is scoped to, so dependencies stay quiet.
const LOG_TARGET: &str = "flight_telemetry";

/// How much the binary reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Lifecycle events and failed cycles.
    #[default]
    Normal,
    /// Every cycle and store call.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Map the `-q` flag and the number of `-v` flags to a verbosity.
    /// `-q` wins over any number of `-v`.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Most detailed level let through at this verbosity.
    #[must_use]
    pub fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::INFO,
            Self::Verbose => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Build the filter: `rust_log` when given and parseable, otherwise a
/// single directive for this crate at `verbosity`.
fn build_filter(verbosity: Verbosity, rust_log: Option<&str>) -> EnvFilter {
    let fallback = || EnvFilter::new(format!("{LOG_TARGET}={}", verbosity.level()));
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| fallback())
        }
        _ => fallback(),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Later calls are no-ops.
///
/// ```no_run
/// use flight_telemetry::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(1, false));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(verbosity, rust_log.as_deref());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
