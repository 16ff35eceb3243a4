use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use smartseva::logger::init_logger;
use smartseva::{
    AccountService, AppConfig, AppState, Args, InferenceRunner, MultiTaskClassifier, OnnxModel,
    Predictor, Processor, argmax, service, softmax,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose, args.json_logs);

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_args(&args);

    let processor =
        Processor::new(config.preprocess.clone()).context("invalid [preprocess] config")?;
    let model = OnnxModel::new(config.model.cuda).with_intra_threads(config.model.intra_threads);
    let runner = InferenceRunner::load(&model, &config.model.path)
        .context("model could not be loaded")?;
    info!(
        input = runner.input_name(),
        outputs = ?runner.output_names(),
        "Model ready"
    );
    let classifier = MultiTaskClassifier::new(processor, runner);

    if let Some(source) = &args.source {
        return print_prediction(&classifier, source, args.probabilities);
    }

    let accounts = AccountService::in_memory(&config.accounts);
    let state = AppState::new(Arc::new(classifier), Arc::new(accounts));
    service::serve(&config.server, state).await
}

fn print_prediction(
    classifier: &MultiTaskClassifier,
    source: &Path,
    probabilities: bool,
) -> Result<()> {
    let prediction = classifier
        .predict_path(source)
        .with_context(|| format!("prediction failed for {}", source.display()))?;

    let output = if probabilities {
        let summarize = |values: &Option<Vec<f32>>| {
            values.as_deref().map(|logits| {
                json!({
                    "logits": logits,
                    "probabilities": softmax(logits),
                    "class": argmax(logits),
                })
            })
        };
        json!({
            "main_output": summarize(&prediction.main_output),
            "severity_output": summarize(&prediction.severity_output),
        })
    } else {
        serde_json::to_value(&prediction)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
