//! Structured logging using **tracing**.
//!
//! Both subscribers write to stderr so stdout stays clean for reports,
//! DOT output and JSON. Filtering follows `RUST_LOG`; without it only
//! warnings and errors are shown.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "depaudit_core=debug,info" } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Initializes the global subscriber with JSON output.
///
/// Call once at the start of the process.
///
/// # Environment Variables
/// - `RUST_LOG`: Controls log filtering (e.g., `RUST_LOG=depaudit_core=debug`)
pub fn init_structured_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_current_span(true)
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes the global subscriber with compact human-readable output.
pub fn init_plain_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}
