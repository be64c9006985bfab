use crate::config::Config;
use common::TelemetryGuard;

pub const SERVICE_NAME: &str = "gateway";

pub fn setup_observability(config: &Config) -> anyhow::Result<Option<TelemetryGuard>> {
    common::init_observability(
        SERVICE_NAME,
        config.otel_endpoint.as_deref(),
        config.log_level,
        config.environment,
    )
}
