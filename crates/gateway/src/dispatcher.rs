use inference::{InferenceBackend, Worker, WorkerResponse};
use std::sync::Arc;
use storage::StorageEvent;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Feeds storage-change notifications to the worker, one blocking task per
/// notification. Runs until every sender is dropped, then waits for the
/// invocations still in flight before returning.
pub fn spawn_dispatcher<B: InferenceBackend + 'static>(
    worker: Arc<Worker<B>>,
    mut notifications: mpsc::Receiver<StorageEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Dispatcher started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                received = notifications.recv() => {
                    let Some(event) = received else { break };
                    let payload = match serde_json::to_string(&event) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode notification");
                            continue;
                        }
                    };
                    let worker = worker.clone();
                    in_flight.spawn_blocking(move || worker.handle(&payload));
                }
                // Reap finished invocations so the set does not grow unbounded
                Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_invocation(finished);
                }
            }
        }

        tracing::info!(
            in_flight = in_flight.len(),
            "Notification channel closed, draining worker invocations"
        );
        while let Some(finished) = in_flight.join_next().await {
            log_invocation(finished);
        }
        tracing::info!("Dispatcher stopped");
    })
}

fn log_invocation(finished: Result<WorkerResponse, JoinError>) {
    match finished {
        Ok(response) if response.is_ok() => {
            tracing::debug!(body = %response.body, "Worker invocation finished");
        }
        Ok(response) => {
            tracing::error!(
                status_code = response.status_code,
                body = %response.body,
                "Worker invocation failed"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Worker task panicked or was cancelled");
        }
    }
}
