//! Telemetry initialization: metrics and structured logging

pub mod metrics;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with an env-filter default suitable
/// for the engine. The webhook binary calls this once at startup; repeated
/// calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
