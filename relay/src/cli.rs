//! Command-line interface definition.

use clap::Parser;
use std::path::PathBuf;

/// otlp-relay: receive OTLP telemetry, run it through configured pipelines,
/// and fan it out to downstream exporters.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the YAML configuration file.
    #[arg(short = 'c', long = "config", default_value = "relay.yaml")]
    pub config: PathBuf,

    /// Validate the configuration and exit without starting the relay.
    #[arg(long)]
    pub check: bool,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parses a human-readable duration string ("200ms", "5s", "3m", "1h") into
/// milliseconds. A bare number is taken as seconds.
pub fn parse_duration_to_millis(value: &str) -> Result<u64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty duration".to_string());
    }

    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => value.split_at(idx),
        None => (value, "s"),
    };

    let quantity: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration number in {value:?}"))?;
    if quantity < 0.0 {
        return Err(format!("duration must be non-negative, got {value:?}"));
    }

    let millis = match unit.trim() {
        "ms" => quantity,
        "s" => quantity * 1_000.0,
        "m" => quantity * 60_000.0,
        "h" => quantity * 3_600_000.0,
        other => return Err(format!("unknown duration unit {other:?} in {value:?}")),
    };

    Ok(millis.round() as u64)
}
