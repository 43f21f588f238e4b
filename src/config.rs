use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::body::ContentEncoding;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    pub inputs: Vec<HttpInputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Collection interval for the `run` command
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
        }
    }
}

/// One polled HTTP input
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpInputConfig {
    pub urls: Vec<String>,
    /// Checked when the request is built, not at load time
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_encoding: ContentEncoding,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Path to a file holding the bearer token, re-read on every fetch
    #[serde(default)]
    pub bearer_token: Option<PathBuf>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_success_status_codes")]
    pub success_status_codes: Vec<u16>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Kept last so it serializes as a trailing TOML table
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl HttpInputConfig {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            method: default_method(),
            body: String::new(),
            content_encoding: ContentEncoding::default(),
            username: None,
            password: None,
            bearer_token: None,
            token: None,
            success_status_codes: default_success_status_codes(),
            timeout_seconds: default_timeout_seconds(),
            headers: HashMap::new(),
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_success_status_codes() -> Vec<u16> {
    vec![200]
}

fn default_timeout_seconds() -> u64 {
    5
}

fn default_interval_seconds() -> u64 {
    10
}

/// Load configuration from `path` with `HTTP_INPUT__*` environment overrides
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(config::Environment::with_prefix("HTTP_INPUT").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.inputs.is_empty() {
        anyhow::bail!("At least one input must be configured");
    }

    if cfg.agent.interval_seconds == 0 {
        anyhow::bail!("Agent interval must be greater than zero");
    }

    for (idx, input) in cfg.inputs.iter().enumerate() {
        validate_input(input).map_err(|e| anyhow::anyhow!("Input #{}: {}", idx + 1, e))?;
    }

    Ok(())
}

pub fn validate_input(input: &HttpInputConfig) -> anyhow::Result<()> {
    if input.urls.is_empty() {
        anyhow::bail!("At least one URL must be configured");
    }

    if input.bearer_token.is_some() && input.token.is_some() {
        anyhow::bail!("Either use 'bearer_token' or 'token' not both");
    }

    if input.success_status_codes.is_empty() {
        anyhow::bail!("At least one success status code must be configured");
    }

    for code in &input.success_status_codes {
        if !(100..=599).contains(code) {
            anyhow::bail!("Invalid success status code: {}", code);
        }
    }

    if input.timeout_seconds == 0 {
        anyhow::bail!("Timeout must be greater than zero");
    }

    Ok(())
}
