use crate::backend::ExecutionProvider;
use anyhow::Context;
use preprocess::{DEFAULT_INPUT_SIZE, DEFAULT_MEAN, DEFAULT_STD, PreprocessConfig};
use std::env;
use std::path::PathBuf;
use storage::keys::{MODEL_BUCKET, MODEL_KEY};

pub use common::{Environment, LogLevel};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub environment: Environment,
    pub log_level: LogLevel,
    pub model_bucket: String,
    pub model_key: String,
    pub model_staging_path: PathBuf,
    pub preprocess: PreprocessConfig,
    pub intra_threads: usize,
    pub execution_provider: ExecutionProvider,
    pub storage_root: PathBuf,
    pub records_root: PathBuf,
    pub otel_endpoint: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();
        let log_level = LogLevel::from_env();

        let model_bucket = env::var("MODEL_BUCKET").unwrap_or_else(|_| MODEL_BUCKET.to_string());
        let model_key = env::var("MODEL_KEY").unwrap_or_else(|_| MODEL_KEY.to_string());
        let model_staging_path = env::var("MODEL_STAGING_PATH")
            .unwrap_or_else(|_| "/tmp/model.onnx".to_string())
            .into();

        let input_size = match env::var("INPUT_SIZE") {
            Ok(v) => v.parse().with_context(|| format!("invalid INPUT_SIZE {v:?}"))?,
            Err(_) => DEFAULT_INPUT_SIZE,
        };
        let mean = triple_from_env("NORM_MEAN", DEFAULT_MEAN)?;
        let std = triple_from_env("NORM_STD", DEFAULT_STD)?;
        let preprocess = PreprocessConfig::new(input_size, mean, std)?;

        let intra_threads = env::var("INTRA_THREADS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(4);

        let execution_provider = match env::var("EXECUTION_PROVIDER") {
            Ok(v) => ExecutionProvider::parse(&v)
                .ok_or_else(|| anyhow::anyhow!("unknown EXECUTION_PROVIDER {v:?}"))?,
            Err(_) => ExecutionProvider::Cpu,
        };

        let storage_root = env::var("STORAGE_ROOT")
            .unwrap_or_else(|_| "data/objects".to_string())
            .into();
        let records_root = env::var("RECORDS_ROOT")
            .unwrap_or_else(|_| "data/records".to_string())
            .into();

        let otel_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Self {
            environment,
            log_level,
            model_bucket,
            model_key,
            model_staging_path,
            preprocess,
            intra_threads,
            execution_provider,
            storage_root,
            records_root,
            otel_endpoint,
        })
    }
}

/// Parses a comma-separated list of three floats, e.g. `0.5,0.5,0.5`.
fn parse_triple(value: &str) -> Option<[f32; 3]> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    parts.try_into().ok()
}

fn triple_from_env(key: &str, default: [f32; 3]) -> anyhow::Result<[f32; 3]> {
    match env::var(key) {
        Ok(v) => parse_triple(&v)
            .ok_or_else(|| anyhow::anyhow!("{key} must be three comma-separated numbers, got {v:?}")),
        Err(_) => Ok(default),
    }
}
