//! Tracing setup for the server and the watch client.

use tracing::Level;

/// Maps a configured level name onto a tracing level. Unknown names fall
/// back to `INFO`.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Installs the global fmt subscriber at `level`.
///
/// Uses `try_init`, so a second call (tests, the CLI re-initialising after
/// loading configuration) is a silent no-op.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(parse_level(level))
        .with_target(false)
        .try_init();
}
