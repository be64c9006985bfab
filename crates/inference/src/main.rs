use inference::{SessionCache, Worker, WorkerConfig, WorkerResponse, logging::setup_observability};
use preprocess::ImagePreprocessor;
use std::sync::Arc;
use storage::{ArtifactLocation, FsObjectStore, FsRecordStore, ObjectArtifactSource};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;

#[cfg(feature = "ort-backend")]
use inference::backend::ort::OrtBackend as Backend;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The worker binary needs the 'ort-backend' feature");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env()?;

    let _telemetry = setup_observability(&config)?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let objects = Arc::new(FsObjectStore::open(&config.storage_root)?);
    let records = Arc::new(FsRecordStore::open(&config.records_root)?);

    let provider = config.execution_provider;
    let intra_threads = config.intra_threads;
    let sessions: SessionCache<Backend> = SessionCache::new(
        Arc::new(ObjectArtifactSource::new(objects.clone())),
        ArtifactLocation::new(&config.model_bucket, &config.model_key),
        &config.model_staging_path,
    )
    .with_loader(move |path| Backend::load_model_with_provider(path, provider, intra_threads));

    let worker = Arc::new(Worker::new(
        objects,
        records,
        sessions,
        ImagePreprocessor::new(config.preprocess.clone())?,
    ));

    // A worker without a model cannot make progress: fail fast
    tracing::info!("Loading inference model");
    if let Err(e) = worker.warm_up() {
        tracing::error!(error = %e, "Model load failed");
        return Err(e.into());
    }

    tracing::info!("Worker ready, reading triggers from stdin (one JSON payload per line)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        let payload = line.trim().to_string();
        if payload.is_empty() {
            continue;
        }
        let worker = worker.clone();
        tasks.spawn_blocking(move || worker.handle(&payload));

        // Emit responses as they complete without waiting for the input to end
        while let Some(done) = tasks.try_join_next() {
            write_response(done?).await?;
        }
    }

    while let Some(done) = tasks.join_next().await {
        write_response(done?).await?;
    }

    tracing::info!("Input closed, worker exiting");
    Ok(())
}

async fn write_response(response: WorkerResponse) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(&response)?;
    line.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}
