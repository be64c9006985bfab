use serde::Deserialize;
use std::path::PathBuf;

pub use common::{Environment, LogLevel};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub bind_addr: String,
    pub upload_bucket: String,
    pub storage_root: PathBuf,
    pub records_root: PathBuf,
    /// Limit on the decoded image size, not the request body.
    pub max_upload_bytes: u64,
    #[serde(default)]
    pub otel_endpoint: Option<String>,
}

/// Reads `GATEWAY_*` environment variables over built-in defaults,
/// e.g. `GATEWAY_BIND_ADDR=127.0.0.1:3000`.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("bind_addr", "0.0.0.0:8080")?
        .set_default("upload_bucket", storage::keys::UPLOAD_BUCKET)?
        .set_default("storage_root", "data/objects")?
        .set_default("records_root", "data/records")?
        .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
