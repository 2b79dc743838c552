//! Tracing subscriber setup.

use kore_core::config::TelemetryConfig;
use tracing_subscriber::EnvFilter;

/// Filter directive for `log_level`: kore crates at that level, everything else at `warn`.
#[must_use]
pub fn default_directive(log_level: &str) -> String {
    format!("kore_core={log_level},kore_llm={log_level},kore_bridge={log_level},warn")
}

/// Install a global fmt subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns `false` if a global subscriber was already installed, which makes
/// repeated calls harmless.
pub fn init_tracing(config: &TelemetryConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}
