use crate::session::SessionError;
use crate::status::TransitionError;
use preprocess::PreprocessError;
use storage::StoreError;
use thiserror::Error;

/// Per-image failures. Each one ends the invocation with a single `failure`
/// transition carrying its message.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Error downloading image: {0}")]
    Fetch(StoreError),

    #[error("Image preprocessing failed: {0}")]
    Decode(#[from] PreprocessError),

    #[error("Inference error: {0:#}")]
    Inference(anyhow::Error),
}

/// Failures that escape the pipeline and turn into a 500 response.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Malformed trigger: {0}")]
    MalformedTrigger(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] SessionError),

    #[error("Failed to persist status: {0}")]
    Persistence(#[from] TransitionError),
}

impl WorkerError {
    /// Label used for the `outcome` metric attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::MalformedTrigger(_) => "malformed_trigger",
            WorkerError::ModelUnavailable(_) => "model_unavailable",
            WorkerError::Persistence(_) => "persistence_error",
        }
    }
}
