//! Internal logging setup.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the tracing subscriber. `RUST_LOG` wins when set; otherwise the
/// `-v` count picks the level for this crate with everything else at WARN.
pub fn init_tracing(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                log_level
            ))
    });
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
