pub mod accounts;
pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod model;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod runner;
pub mod service;

pub use crate::accounts::AccountService;
pub use crate::cli::Args;
pub use crate::config::AppConfig;
pub use crate::error::VisionError;
pub use crate::model::OnnxModel;
pub use crate::pipeline::{MultiTaskClassifier, Prediction, Predictor};
pub use crate::postprocess::{argmax, softmax};
pub use crate::preprocess::{ChannelOrder, PreprocessConfig, Processor};
pub use crate::runner::InferenceRunner;
pub use crate::service::AppState;
