//! Process-wide `tracing` subscriber.
//!
//! The library never installs a subscriber on its own; the host (through
//! `ShelfStore::new`) or a binary calls `init_logging` once. `RUST_LOG`
//! overrides the default `shelf=info` filter.

use std::sync::Once;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "shelf=info";

static LOGGING_INIT: Once = Once::new();

pub fn init_logging() {
    LOGGING_INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let stderr_layer = fmt::layer()
            .with_level(true)
            .with_target(true)
            .with_ansi(cfg!(not(test)))
            .with_writer(std::io::stderr);

        // Another subscriber may already be installed by the embedding process
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
        tracing::info!("logging initialised twice without panicking");
    }
}
