//! Run configuration, model architecture and dashboard connection settings.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PlotError, Result};

/// Settings of the training run that shape which plots exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Examples per batch; also the number of images shown per grid.
    pub batch_size: usize,
    /// Number of training epochs.
    #[serde(default = "default_n_epochs")]
    pub n_epochs: usize,
    /// Number of iterative inference (refinement) steps per forward pass.
    #[serde(default = "default_n_iterations")]
    pub n_iterations: usize,
    /// Any other settings, kept for the configuration text panel.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_n_epochs() -> usize {
    100
}

fn default_n_iterations() -> usize {
    1
}

impl RunConfig {
    pub fn new(batch_size: usize, n_epochs: usize, n_iterations: usize) -> Self {
        Self {
            batch_size,
            n_epochs,
            n_iterations,
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extra setting shown in the configuration panel.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Whether improvement-over-iterations plots are produced.
    pub fn tracks_improvement(&self) -> bool {
        self.n_iterations > 1
    }

    /// One-line description for the dashboard text panel.
    pub fn describe(&self) -> Result<String> {
        describe("Train Config", self)
    }
}

/// Description of the hierarchical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    /// Latent dimensionality of each level, lowest level first.
    pub n_latent: Vec<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ModelArchitecture {
    pub fn new(n_latent: Vec<usize>) -> Self {
        Self {
            n_latent,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Number of latent levels.
    pub fn n_levels(&self) -> usize {
        self.n_latent.len()
    }

    pub fn describe(&self) -> Result<String> {
        describe("Model Architecture", self)
    }
}

/// Where the dashboard lives and which environment to write into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_env")]
    pub env: String,
    /// Path prefix when the server is mounted behind a proxy.
    #[serde(default)]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_server() -> String {
    "http://localhost".into()
}

fn default_port() -> u16 {
    8097
}

fn default_env() -> String {
    "main".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            env: default_env(),
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DashboardConfig {
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Root URL of the server, e.g. `http://localhost:8097`.
    pub fn root_url(&self) -> String {
        let server = self.server.trim_end_matches('/');
        let base = self.base_url.trim_matches('/');
        if base.is_empty() {
            format!("{}:{}", server, self.port)
        } else {
            format!("{}:{}/{}", server, self.port, base)
        }
    }

    /// URL of an API endpoint such as `events` or `update`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.root_url(), endpoint)
    }
}

/// Everything a plotting run needs, as stored on disk.
///
/// # Example
///
/// ```rust,ignore
/// let config = ExperimentConfig::from_file("experiment.json")?;
/// config.validate()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub run: RunConfig,
    pub architecture: ModelArchitecture,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl ExperimentConfig {
    /// Load a JSON configuration file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        tracing::debug!("Loaded experiment config from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.batch_size == 0 {
            return Err(PlotError::Config("batch_size must be positive".into()));
        }
        if self.run.n_iterations == 0 {
            return Err(PlotError::Config("n_iterations must be at least 1".into()));
        }
        if self.architecture.n_latent.is_empty() {
            return Err(PlotError::Config(
                "architecture needs at least one latent level".into(),
            ));
        }
        if self.dashboard.env.is_empty() {
            return Err(PlotError::Config("dashboard env must not be empty".into()));
        }
        Ok(())
    }
}

fn describe<T: Serialize>(heading: &str, value: &T) -> Result<String> {
    let fields = match serde_json::to_value(value)? {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{} = {}", key, s),
                other => format!("{} = {}", key, other),
            })
            .collect::<Vec<_>>(),
        other => vec![other.to_string()],
    };
    Ok(format!("{}: {}", heading, fields.join(", ")))
}
