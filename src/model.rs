use std::path::Path;

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use tracing::info;

use crate::error::{Result, VisionError};

/// Builds ONNX Runtime sessions for a fixed execution provider setup.
pub struct OnnxModel {
    provider: [ExecutionProviderDispatch; 1],
    intra_threads: Option<usize>,
}

impl OnnxModel {
    pub fn new(cuda: bool) -> Self {
        let provider = if cuda {
            [CUDAExecutionProvider::default().build().error_on_failure()]
        } else {
            [CPUExecutionProvider::default().build()]
        };
        Self {
            provider,
            intra_threads: None,
        }
    }

    pub fn with_intra_threads(mut self, threads: Option<usize>) -> Self {
        self.intra_threads = threads;
        self
    }

    /// Load the model artifact. Any failure here is a start-up error.
    pub fn load_model(&self, model_path: &Path) -> Result<Session> {
        if !model_path.is_file() {
            return Err(VisionError::model_load(model_path, "model file not found"));
        }

        info!("Loading model from {}", model_path.display());
        let session = self
            .build_session(model_path)
            .map_err(|e| VisionError::model_load(model_path, e))?;
        info!(
            inputs = session.inputs.len(),
            outputs = session.outputs.len(),
            "Model loaded"
        );
        Ok(session)
    }

    fn build_session(&self, model_path: &Path) -> ort::Result<Session> {
        let mut builder = SessionBuilder::new()?
            .with_execution_providers(self.provider.clone())?
            .with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(threads) = self.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        builder.commit_from_file(model_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_a_model_load_error() {
        let err = OnnxModel::new(false)
            .load_model(Path::new("/nonexistent/smartseva_multi_task.onnx"))
            .unwrap_err();
        match err {
            VisionError::ModelLoad { path, message } => {
                assert!(path.ends_with("smartseva_multi_task.onnx"));
                assert_eq!(message, "model file not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn directory_is_not_a_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxModel::new(false).load_model(dir.path()).unwrap_err();
        assert!(matches!(err, VisionError::ModelLoad { .. }));
    }
}
