pub mod backend;
pub mod classify;
pub mod config;
pub mod error;
pub mod logging;
pub mod response;
pub mod service;
pub mod session;
pub mod status;
pub mod trigger;

// Re-export commonly used types for convenience
pub use backend::{ExecutionProvider, InferenceBackend};
pub use classify::Prediction;
pub use config::WorkerConfig;
pub use error::{PipelineError, WorkerError};
pub use response::WorkerResponse;
pub use service::{Outcome, Worker};
pub use session::{SessionCache, SessionError};
pub use status::{StatusChange, StatusTracker, TransitionError};
pub use trigger::Trigger;
