use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML config file (defaults to ./smartseva.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// ONNX model path
    #[arg(long)]
    pub model: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Run the model on the CUDA execution provider
    #[arg(long)]
    pub cuda: bool,

    /// image path: predict once, print JSON and exit instead of serving
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// With --source, also print softmax probabilities and the top class
    #[arg(long, requires = "source")]
    pub probabilities: bool,

    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}
