use gateway::{
    AppState, IntakeService, config::get_configuration, logging::setup_observability, router,
    spawn_dispatcher,
};
use inference::{SessionCache, Worker, WorkerConfig, backend::ort::OrtBackend};
use preprocess::ImagePreprocessor;
use std::sync::Arc;
use storage::{ArtifactLocation, FsObjectStore, FsRecordStore, ObjectArtifactSource};
use tokio::sync::mpsc;

const NOTIFICATION_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;
    // Model and preprocessing settings are shared with the standalone worker
    let worker_config = WorkerConfig::from_env()?;

    let _telemetry = setup_observability(&config)?;

    tracing::info!(
        config = ?config,
        worker_config = ?worker_config,
        "Loaded configuration"
    );

    let objects = Arc::new(FsObjectStore::open(&config.storage_root)?);
    let records = Arc::new(FsRecordStore::open(&config.records_root)?);

    let provider = worker_config.execution_provider;
    let intra_threads = worker_config.intra_threads;
    let sessions: SessionCache<OrtBackend> = SessionCache::new(
        Arc::new(ObjectArtifactSource::new(objects.clone())),
        ArtifactLocation::new(&worker_config.model_bucket, &worker_config.model_key),
        &worker_config.model_staging_path,
    )
    .with_loader(move |path| OrtBackend::load_model_with_provider(path, provider, intra_threads));

    let worker = Arc::new(Worker::new(
        objects.clone(),
        records.clone(),
        sessions,
        ImagePreprocessor::new(worker_config.preprocess.clone())?,
    ));

    tracing::info!("Loading inference model");
    let warm = worker.clone();
    tokio::task::spawn_blocking(move || warm.warm_up()).await??;

    let (tx, rx) = mpsc::channel(NOTIFICATION_CAPACITY);
    let dispatcher = spawn_dispatcher(worker.clone(), rx);

    let ready = worker.clone();
    let state = AppState {
        intake: Arc::new(IntakeService::new(
            objects,
            records,
            &config.upload_bucket,
            config.max_upload_bytes,
        )),
        notifications: tx,
        model_ready: Arc::new(move || ready.is_ready()),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last sender; the dispatcher returns once every
    // queued notification has been processed
    dispatcher.await?;
    tracing::info!("Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
