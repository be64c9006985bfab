use crate::intake::IntakeService;
use std::sync::Arc;
use storage::StorageEvent;
use tokio::sync::mpsc;

/// Reports whether the worker's model session is loaded.
pub type ReadinessProbe = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<IntakeService>,
    /// Storage-change notifications for the in-process worker.
    pub notifications: mpsc::Sender<StorageEvent>,
    pub model_ready: ReadinessProbe,
}
