//! # kb-telemetry
//!
//! Logging setup for services embedding `kb-search`, plus an in-memory
//! event capture layer for tests.
//!
//! The log filter comes from `KB_SEARCH_LOG`, then `RUST_LOG`, then
//! defaults to `info`.
//!
//! ```rust,ignore
//! kb_telemetry::init_telemetry("kb-search-demo")?;
//! tracing::info!("ready");
//! ```

mod capture;

pub use capture::{CaptureLayer, CapturedEvent, CapturedEvents};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "KB_SEARCH_LOG";

/// Errors from subscriber installation.
pub type TelemetryError = tracing_subscriber::util::TryInitError;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a human-readable subscriber as the global default.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_telemetry(service: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()?;
    tracing::info!(service, "telemetry initialized");
    Ok(())
}

/// Install a JSON subscriber as the global default, one object per line.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_json_telemetry(service: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
        .try_init()?;
    tracing::info!(service, "telemetry initialized");
    Ok(())
}

/// Build a subscriber that records every event into the returned storage.
///
/// Meant for tests: install it with `tracing::subscriber::set_default`.
pub fn capture_subscriber() -> (impl tracing::Subscriber + Send + Sync, CapturedEvents) {
    let events = CapturedEvents::new();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(events.clone()));
    (subscriber, events)
}
