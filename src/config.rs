//! Configuration file handling.
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/flowscan/config.toml`
//! - macOS: `~/Library/Application Support/flowscan/config.toml`
//! - Windows: `%APPDATA%\flowscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! api_version = "60.0"
//! min_api_version = 58.0
//! default_format = "table"
//! instance_url = "acme.my.salesforce.com"
//! use_core = true
//! core_command = ["lightning-flow-scanner"]
//! request_timeout_secs = 30
//! engine_timeout_secs = 120
//!
//! [ignore]
//! rules = ["Flow Name Convention", "API*"]
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Application configuration.
///
/// # Example
///
/// ```no_run
/// use flowscan::Config;
///
/// let config = Config::load().unwrap();
/// println!("Tooling API version: {}", config.api_version);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Salesforce REST API version used in request paths.
    ///
    /// Default: "60.0"
    pub api_version: String,

    /// Flows whose metadata `apiVersion` is below this trigger the
    /// `API Version` rule.
    ///
    /// Default: 58.0
    pub min_api_version: f64,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json", "csv", "html"
    pub default_format: String,

    /// Instance host used when `--host` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,

    /// Whether to try the external Flow Scanner engine before the basic rules.
    pub use_core: bool,

    /// Program and arguments that run the external engine.
    pub core_command: Vec<String>,

    /// Per-request HTTP timeout, in seconds.
    pub request_timeout_secs: u64,

    /// How long the external engine may run before the scan falls back.
    pub engine_timeout_secs: u64,

    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Rules to suppress from scan output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Rule names to drop. Supports `*` wildcards (e.g. "API*").
    pub rules: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_rule(&self, rule: &str) -> bool {
        self.rules.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, rule)
            } else {
                pattern == rule
            }
        })
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) {
        return false;
    }
    let mut remaining = &text[first.len()..];

    if !remaining.ends_with(last) {
        return false;
    }
    remaining = &remaining[..remaining.len() - last.len()];

    for part in parts[1..parts.len() - 1].iter().filter(|p| !p.is_empty()) {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_version: "60.0".to_string(),
            min_api_version: 58.0,
            default_format: "table".to_string(),
            instance_url: None,
            use_core: true,
            core_command: vec!["lightning-flow-scanner".to_string()],
            request_timeout_secs: 30,
            engine_timeout_secs: 120,
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file, or defaults if it doesn't
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration, creating the parent directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flowscan")
            .join("config.toml")
    }

    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}
