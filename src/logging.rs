//! Structured logging.
//!
//! Everything goes to **stderr**: stdout carries the handshake line and nothing else.
//! Filtering follows `RUST_LOG` (e.g. `hemmer_provider_aws=debug,aws_smithy_runtime=info`);
//! when it is unset the binary falls back to `HEMMER_LOG_LEVEL`, then `info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable naming the default level when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "HEMMER_LOG_LEVEL";

const DEFAULT_LEVEL: &str = "info";

/// The default level from [`LOG_LEVEL_ENV`], or `info`.
pub fn default_level() -> String {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .filter(|level| EnvFilter::try_new(level).is_ok())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Install the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Install the global subscriber, using `default_level` when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a subscriber
/// is already installed.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter(DEFAULT_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_aws=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_aws=debug,aws_smithy_runtime=info").is_ok());
    }

    #[test]
    fn test_try_init_twice() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
