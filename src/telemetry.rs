//! Logging initialization.
//!
//! Log lines go to stderr so they never mix with build output.
//! The filter comes from `RUST_LOG` when set; otherwise the default is
//! `warn`, raised to `debug` by the global `--verbose` flag. Setting
//! `SQLFORGE_LOG_FORMAT=json` switches to JSON lines for collectors.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Call once, from `main`.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = std::env::var("SQLFORGE_LOG_FORMAT").is_ok_and(|v| v == "json");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
