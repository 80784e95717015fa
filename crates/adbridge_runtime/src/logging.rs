//! Logging bootstrap
//!
//! Hosts that embed the bridge through the C ABI have no Rust `main` to set up
//! a subscriber, so the bridge installs one itself. `RUST_LOG` overrides the
//! configured filter.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a global fmt subscriber. Later calls are no-ops, as is a call made
/// after the host installed its own subscriber.
pub fn init_logging(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let result = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        if result.is_err() {
            tracing::debug!("Global subscriber already installed, keeping it");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("debug");
        init_logging("not a [valid filter");
        tracing::info!("logging initialized");
    }
}
