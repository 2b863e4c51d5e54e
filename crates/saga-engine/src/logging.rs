//! Tracing subscriber setup for hosts and tests.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `warn`.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::debug!(target: "saga_engine", "still running");
    }
}
