use std::path::Path;

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::postprocess::extract_output;
use crate::preprocess::Processor;
use crate::runner::InferenceRunner;

pub const MAIN_OUTPUT: &str = "main_output";
pub const SEVERITY_OUTPUT: &str = "severity_output";

/// Raw output vectors for one image. `None` when the model does not
/// declare the output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub main_output: Option<Vec<f32>>,
    pub severity_output: Option<Vec<f32>>,
}

/// Image bytes in, output vectors out.
pub trait Predictor: Send + Sync {
    fn predict(&self, image: &[u8]) -> Result<Prediction>;

    fn predict_path(&self, path: &Path) -> Result<Prediction>;
}

/// Preprocessing, a single forward pass and output extraction for the
/// multi-task classification model.
pub struct MultiTaskClassifier {
    processor: Processor,
    runner: InferenceRunner,
}

impl MultiTaskClassifier {
    pub fn new(processor: Processor, runner: InferenceRunner) -> Self {
        Self { processor, runner }
    }

    fn infer(&self, input: Array4<f32>) -> Result<Prediction> {
        self.runner.run(input, |outputs| {
            Ok(Prediction {
                main_output: extract_output(outputs, MAIN_OUTPUT)?,
                severity_output: extract_output(outputs, SEVERITY_OUTPUT)?,
            })
        })
    }
}

impl Predictor for MultiTaskClassifier {
    fn predict(&self, image: &[u8]) -> Result<Prediction> {
        let input = self.processor.preprocess_bytes(image)?;
        self.infer(input)
    }

    fn predict_path(&self, path: &Path) -> Result<Prediction> {
        let input = self.processor.preprocess_path(path)?;
        self.infer(input)
    }
}
