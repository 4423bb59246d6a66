//! Logging configuration and initialization
//!
//! Sets up the tracing subscriber used by the gateway and its vendor clients.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Normalise a configured level to an `EnvFilter` directive.
///
/// Only the first word counts, so trailing comments in the config are
/// tolerated. `warning` and `critical` are accepted as aliases; anything
/// unrecognised falls back to `info`.
pub fn normalize_level(log_level: &str) -> &'static str {
    let level = log_level
        .split_whitespace()
        .next()
        .unwrap_or("info")
        .to_lowercase();

    match level.as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" => "error",
        _ => "info",
    }
}

/// Initialize the logging system. `RUST_LOG` takes precedence over `log_level`.
pub fn init_logging(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(normalize_level(log_level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level("critical"), "error");
        assert_eq!(normalize_level("debug # verbose"), "debug");
        assert_eq!(normalize_level("loud"), "info");
        assert_eq!(normalize_level(""), "info");
    }
}
