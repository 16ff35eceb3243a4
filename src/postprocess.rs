use ndarray::{Array1, Array2, ArrayView1, ArrayViewD, Ix1, Ix2};
use ort::value::DynValue;
use tracing::warn;

use crate::error::{Result, VisionError};

/// The closed set of output layouts the extractor understands.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// `[batch, n]` single precision, row 0 is used.
    Batched(Array2<f32>),
    /// `[n]` single precision, used as-is.
    Flat(Array1<f32>),
    /// `[batch, n]` double precision, row 0 narrowed to `f32`.
    BatchedF64(Array2<f64>),
}

impl RawOutput {
    /// Decode a runtime value, trying `f32` before `f64`.
    pub fn from_value(name: &str, value: &DynValue) -> Result<Self> {
        if let Ok(view) = value.try_extract_tensor::<f32>() {
            return Self::from_f32(name, view);
        }
        match value.try_extract_tensor::<f64>() {
            Ok(view) => Self::from_f64(name, view),
            Err(e) => Err(VisionError::UnsupportedOutputType {
                name: name.to_string(),
                detail: e.to_string(),
            }),
        }
    }

    pub fn from_f32(name: &str, view: ArrayViewD<'_, f32>) -> Result<Self> {
        match view.ndim() {
            2 => Ok(RawOutput::Batched(
                view.into_dimensionality::<Ix2>()?.to_owned(),
            )),
            1 => Ok(RawOutput::Flat(view.into_dimensionality::<Ix1>()?.to_owned())),
            rank => Err(unsupported(name, "f32", rank)),
        }
    }

    pub fn from_f64(name: &str, view: ArrayViewD<'_, f64>) -> Result<Self> {
        match view.ndim() {
            2 => Ok(RawOutput::BatchedF64(
                view.into_dimensionality::<Ix2>()?.to_owned(),
            )),
            rank => Err(unsupported(name, "f64", rank)),
        }
    }

    /// Flatten into the vector handed back to callers.
    pub fn into_values(self, name: &str) -> Result<Vec<f32>> {
        match self {
            RawOutput::Batched(batch) => {
                if batch.nrows() == 0 {
                    return Err(VisionError::EmptyOutput(name.to_string()));
                }
                Ok(batch.row(0).to_vec())
            }
            RawOutput::Flat(values) => Ok(values.to_vec()),
            RawOutput::BatchedF64(batch) => {
                if batch.nrows() == 0 {
                    return Err(VisionError::EmptyOutput(name.to_string()));
                }
                Ok(batch.row(0).iter().map(|v| *v as f32).collect())
            }
        }
    }
}

fn unsupported(name: &str, dtype: &str, rank: usize) -> VisionError {
    VisionError::UnsupportedOutputType {
        name: name.to_string(),
        detail: format!("{dtype} tensor of rank {rank}"),
    }
}

/// Result set of one forward pass, as seen by the extractor.
pub trait OutputSource {
    /// Whether the model declares an output with this name.
    fn declares(&self, name: &str) -> bool;

    /// Decode the named output, `None` when the result set lacks it.
    fn fetch(&self, name: &str) -> Option<Result<RawOutput>>;
}

/// Pull one recognised output out of a result set.
///
/// An output the model never declared yields `Ok(None)`; a declared output
/// absent from the result set is an error.
pub fn extract_output(source: &dyn OutputSource, name: &str) -> Result<Option<Vec<f32>>> {
    if !source.declares(name) {
        warn!("Output missing: {}", name);
        return Ok(None);
    }
    let raw = source
        .fetch(name)
        .ok_or_else(|| VisionError::OutputMissing(name.to_string()))??;
    raw.into_values(name).map(Some)
}

/// Applies softmax to a slice of logits. Not used on the default path.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let slice = ArrayView1::from(logits);
    let max_val = slice.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_vals: Array1<f32> = slice.mapv(|x| (x - max_val).exp());
    let sum_exp: f32 = exp_vals.sum();
    exp_vals.mapv(|v| v / sum_exp).to_vec()
}

pub fn argmax_and_max(values: &[f32]) -> Option<(usize, f32)> {
    let (&first, rest) = values.split_first()?;
    Some(
        rest.iter()
            .enumerate()
            .fold((0, first), |(max_idx, max_val), (i, &val)| {
                if val > max_val { (i + 1, val) } else { (max_idx, max_val) }
            }),
    )
}

/// Index of the largest value, lowest index on ties, `None` when empty.
pub fn argmax(values: &[f32]) -> Option<usize> {
    argmax_and_max(values).map(|(idx, _)| idx)
}
