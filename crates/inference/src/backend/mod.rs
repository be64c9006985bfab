use ndarray::{ArrayD, ArrayViewD};
use std::path::Path;

pub mod mock;
#[cfg(feature = "ort-backend")]
pub mod ort;

/// A loaded model that maps one input tensor to one output tensor.
///
/// Implementations are shared across concurrent invocations, so `infer` takes
/// `&self` and must not rely on state carried over from earlier calls.
pub trait InferenceBackend: Send + Sync {
    fn load_model(path: &Path) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Runs a forward pass on `input` (fed under the model's first declared
    /// input) and returns the model's first output.
    fn infer(&self, input: ArrayViewD<'_, f32>) -> anyhow::Result<ArrayD<f32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

impl ExecutionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionProvider::Cpu => "cpu",
            ExecutionProvider::Cuda => "cuda",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "cpu" => Some(ExecutionProvider::Cpu),
            "cuda" | "gpu" => Some(ExecutionProvider::Cuda),
            _ => None,
        }
    }
}
