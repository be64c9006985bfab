use crate::config::WorkerConfig;
use common::TelemetryGuard;

pub const SERVICE_NAME: &str = "inference-worker";

/// Installs logging, plus OTLP export when an endpoint is configured.
pub fn setup_observability(config: &WorkerConfig) -> anyhow::Result<Option<TelemetryGuard>> {
    common::init_observability(
        SERVICE_NAME,
        config.otel_endpoint.as_deref(),
        config.log_level,
        config.environment,
    )
}
