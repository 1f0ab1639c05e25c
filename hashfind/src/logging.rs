//! Diagnostic logging to stderr.

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a filter directive, e.g. `hashfind_core=debug`.
pub const LOG_ENV: &str = "HASHFIND_LOG";

/// Default filter for a given `-v` count.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the global subscriber.
///
/// `HASHFIND_LOG` wins over `-v` when set. Output always goes to stderr so
/// stdout stays clean for command results.
pub fn init_logging(verbosity: u8) {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(directive.trim())
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity))),
        _ => EnvFilter::new(default_directive(verbosity)),
    };

    let _ = Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbosity > 1)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
