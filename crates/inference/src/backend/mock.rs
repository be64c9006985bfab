//! Deterministic backend for tests and benchmarks.
//!
//! The "model artifact" is a JSON document: either `{"scores": [...]}`, which
//! is returned as a `[1, N]` output for every input, or `{"error": "..."}`,
//! which makes every forward pass fail with that message.

use super::InferenceBackend;
use anyhow::Context;
use ndarray::{Array2, ArrayD, ArrayViewD};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MockModel {
    Scores { scores: Vec<f32> },
    Error { error: String },
}

impl MockModel {
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct MockBackend {
    model: MockModel,
}

impl MockBackend {
    pub fn new(model: MockModel) -> Self {
        Self { model }
    }
}

impl InferenceBackend for MockBackend {
    fn load_model(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading mock model {}", path.display()))?;
        let model = serde_json::from_slice(&bytes).context("parsing mock model")?;
        Ok(Self { model })
    }

    fn infer(&self, input: ArrayViewD<'_, f32>) -> anyhow::Result<ArrayD<f32>> {
        if input.ndim() != 4 || input.shape()[0] != 1 || input.shape()[1] != 3 {
            anyhow::bail!("expected input of shape [1, 3, H, W], got {:?}", input.shape());
        }
        match &self.model {
            MockModel::Scores { scores } => {
                Ok(Array2::from_shape_vec((1, scores.len()), scores.clone())?.into_dyn())
            }
            MockModel::Error { error } => Err(anyhow::anyhow!("{error}")),
        }
    }
}
