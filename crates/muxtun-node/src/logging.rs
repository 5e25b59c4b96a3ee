//! Tracing subscriber configuration for the node.
//!
//! The `-d` verbosity maps onto tracing levels:
//! - 0: warnings and errors only
//! - 1: high-level tunnel events (sockets bound, flush summaries)
//! - 2: per-packet detail
//! - 3: wire-level detail, including ROHC library traces
//!
//! The `RUST_LOG` environment variable overrides the mapping when set.

use tracing_subscriber::EnvFilter;

fn filter_for(verbosity: u8) -> EnvFilter {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize the tracing subscriber for the given `-d` verbosity.
pub fn init(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbosity))
        .init();
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` to avoid panicking if called multiple times.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
