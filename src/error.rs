use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the inference pipeline.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Unable to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Unable to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid preprocessing config: {0}")]
    Config(String),

    #[error("Resize failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("{0} missing")]
    OutputMissing(String),

    #[error("Unhandled output type for {name}: {detail}")]
    UnsupportedOutputType { name: String, detail: String },

    #[error("Output {0} has an empty batch")]
    EmptyOutput(String),

    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("ONNX Runtime error: {0}")]
    Runtime(#[from] ort::Error),
}

impl VisionError {
    /// True when the failure came from an unreadable or corrupt image.
    pub fn is_decode(&self) -> bool {
        matches!(self, VisionError::Decode(_) | VisionError::Io { .. })
    }

    pub(crate) fn model_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        VisionError::ModelLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;
