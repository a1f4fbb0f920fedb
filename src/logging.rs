//! Tracing subscriber setup for the CLI.
//!
//! Level filtering comes from `RUST_LOG` (default `info`). Logs go to stderr
//! so snapshot CSV written to stdout stays machine-readable.
//!
//! ```bash
//! # Per-tick controller events
//! RUST_LOG=rai_sim::controller=trace rai-sim replay --prices data/rai.csv
//! ```

use clap::ValueEnum;
use tracing_subscriber::filter::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON lines
    Json,
}

pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.with_target(false).init(),
    }
}
