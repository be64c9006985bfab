use super::{ExecutionProvider, InferenceBackend};
use ndarray::{ArrayD, ArrayViewD};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;
use std::sync::Mutex;

const DEFAULT_INTRA_THREADS: usize = 4;

/// ONNX Runtime backend over a single session.
///
/// `Session::run` takes `&mut self`, so the session sits behind a mutex and
/// concurrent invocations sharing one backend run their forward passes one
/// at a time. Preprocessing, fetching and status writes still overlap; only
/// the model call is serialized. Intra-op threads parallelize each pass.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &Path,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[allow(unused_mut)]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?;

        match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                anyhow::bail!("CUDA execution provider requested but the `cuda` feature is disabled");
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        // Single-input single-task classifier: only the first of each is used
        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| anyhow::anyhow!("model declares no inputs"))?;
        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or_else(|| anyhow::anyhow!("model declares no outputs"))?;

        tracing::info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            provider = provider.as_str(),
            "Model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &Path) -> anyhow::Result<Self> {
        Self::load_model_with_provider(path, ExecutionProvider::Cpu, DEFAULT_INTRA_THREADS)
    }

    fn infer(&self, input: ArrayViewD<'_, f32>) -> anyhow::Result<ArrayD<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("inference session lock poisoned"))?;

        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(input)?
        ])?;

        let scores = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
        Ok(scores.into_owned())
    }
}
