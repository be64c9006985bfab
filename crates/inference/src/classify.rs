use crate::backend::InferenceBackend;
use ndarray::{Array, ArrayViewD, Axis, IxDyn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub score: f32,
}

/// Runs `handle` on a preprocessed tensor and reduces the output to a class.
#[tracing::instrument(skip_all)]
pub fn infer<B: InferenceBackend + ?Sized>(
    handle: &B,
    tensor: &Array<f32, IxDyn>,
) -> anyhow::Result<Prediction> {
    let output = handle.infer(tensor.view())?;
    argmax_first_row(&output.view())
}

/// Arg-max over the first row of a `[batch, classes]` score matrix.
///
/// Among equal maxima the lowest index wins. NaN scores are rejected rather
/// than ordered.
pub fn argmax_first_row(scores: &ArrayViewD<f32>) -> anyhow::Result<Prediction> {
    if scores.ndim() != 2 {
        anyhow::bail!(
            "expected model output of shape [batch, classes], got {:?}",
            scores.shape()
        );
    }
    if scores.shape()[0] == 0 {
        anyhow::bail!("model output has an empty batch");
    }

    let row = scores.index_axis(Axis(0), 0);

    let mut best: Option<Prediction> = None;
    for (class_index, &score) in row.iter().enumerate() {
        if score.is_nan() {
            anyhow::bail!("model output contains NaN at class {class_index}");
        }
        // Strict comparison keeps the first index on ties
        if best.is_none_or(|b| score > b.score) {
            best = Some(Prediction { class_index, score });
        }
    }

    best.ok_or_else(|| anyhow::anyhow!("model output has no classes"))
}
