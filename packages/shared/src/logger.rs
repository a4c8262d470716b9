//! Tracing subscriber setup shared by every Vigil binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when it is set. Otherwise the binary's own crate logs at
/// `default_level` and everything else at `info`.
pub fn setup_logger(bin_name: &str, default_level: &str) {
    let crate_name = bin_name.replace('-', "_");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,{crate_name}={default_level},tower_http=debug"
        ))
    });

    // try_init: tests and embedders may already have installed a subscriber
    match tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
    {
        Ok(()) => tracing::debug!(bin = bin_name, "logger initialized"),
        Err(e) => tracing::debug!(bin = bin_name, error = %e, "keeping existing global subscriber"),
    }
}
