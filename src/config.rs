use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounts::AccountsConfig;
use crate::cli::Args;
use crate::preprocess::PreprocessConfig;

pub const DEFAULT_CONFIG_FILE: &str = "smartseva.toml";
pub const DEFAULT_MODEL_PATH: &str = "model/smartseva_multi_task.onnx";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub preprocess: PreprocessConfig,
    pub accounts: AccountsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_bytes: 10 * 1024 * 1024,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub cuda: bool,
    pub intra_threads: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            cuda: false,
            intra_threads: None,
        }
    }
}

impl AppConfig {
    /// Load `path`, or `smartseva.toml` when no path is given.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !config_path.exists() {
            if required {
                anyhow::bail!("config file not found: {}", config_path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Command-line flags win over file values.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(model) = &args.model {
            self.model.path = model.clone();
        }
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if args.cuda {
            self.model.cuda = true;
        }
    }
}
