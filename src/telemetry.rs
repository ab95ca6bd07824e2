//! Logging bootstrap.
//!
//! The library only emits `tracing` events; installing a subscriber is left to the binary or
//! test that embeds it.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a formatted subscriber filtered by `RUST_LOG`, falling back to `default_directives`
/// (for example `"info,cnpj_etl=debug"`). Span close events are logged with their timings.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_directives: &str) -> bool {
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .try_init()
        .is_ok()
}

/// Subscriber for tests: output goes through the test harness capture. Safe to call from every
/// test.
pub fn init_test_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_target(false)
        .with_test_writer()
        .try_init();
}
