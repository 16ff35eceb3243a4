use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::model::OnnxModel;
use crate::postprocess::{OutputSource, RawOutput};

/// Owns the loaded model and executes forward passes.
///
/// `Session::run` only needs `&self`, so one runner is shared across
/// request workers without locking.
pub struct InferenceRunner {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
}

impl InferenceRunner {
    pub fn load(model: &OnnxModel, model_path: &Path) -> Result<Self> {
        let session = model.load_model(model_path)?;
        Self::from_session(session, model_path)
    }

    /// Wrap an already-built session. The model must declare exactly one input.
    pub fn from_session(session: Session, model_path: &Path) -> Result<Self> {
        let input_name = match session.inputs.as_slice() {
            [input] => input.name.clone(),
            inputs => {
                return Err(VisionError::model_load(
                    model_path,
                    format!("expected exactly one model input, found {}", inputs.len()),
                ));
            }
        };
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();
        Ok(Self {
            session,
            input_name,
            output_names,
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Run one forward pass and hand the result set to `extract`.
    ///
    /// The input tensor and the result set are released when this returns,
    /// whether `extract` succeeds or not.
    pub fn run<T>(
        &self,
        input: Array4<f32>,
        extract: impl FnOnce(&dyn OutputSource) -> Result<T>,
    ) -> Result<T> {
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor]?)?;
        debug!("Model outputs: {:?}", self.output_names);

        let source = SessionResults {
            declared: &self.output_names,
            fetch: |name: &str| {
                outputs
                    .get(name)
                    .map(|value| RawOutput::from_value(name, value))
            },
        };
        extract(&source)
    }
}

struct SessionResults<'a, F> {
    declared: &'a [String],
    fetch: F,
}

impl<F> OutputSource for SessionResults<'_, F>
where
    F: Fn(&str) -> Option<Result<RawOutput>>,
{
    fn declares(&self, name: &str) -> bool {
        self.declared.iter().any(|declared| declared == name)
    }

    fn fetch(&self, name: &str) -> Option<Result<RawOutput>> {
        (self.fetch)(name)
    }
}
