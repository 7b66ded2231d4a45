/// Logging setup
///
/// Always writes to stderr; stdout carries the JSON-RPC stream.
/// `RUST_LOG` wins when set, otherwise `info` (or `debug` with `DEBUG=true`).

use tracing_subscriber::EnvFilter;

fn default_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

pub fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(debug)))
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init(debug: bool) -> bool {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(debug))
        .with_target(false)
        .try_init()
        .is_ok()
}
