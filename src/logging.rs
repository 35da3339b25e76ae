//! Logging initialisation for the testverse binary.
//!
//! Logs go to stderr, filtered by `RUST_LOG` when it is set. Otherwise
//! `--verbose` selects `info` and the default is `warn`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// Call once from `main`.
pub fn init(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
