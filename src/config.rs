//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.plviz.toml` files. The API token is never read from or written to
//! the file; it comes from the command line or `PL_TOKEN`.

use crate::aggregator::CourseSpec;
use crate::chart::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::course::DEFAULT_HISTOGRAM_BINS;
use crate::transport::DEFAULT_BASE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".plviz.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// PrairieLearn API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Student lookup settings.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Chart output settings.
    #[serde(default)]
    pub charts: ChartsConfig,

    /// Course instances to aggregate, in fetch order.
    #[serde(default)]
    pub courses: Vec<CourseSpec>,
}

/// PrairieLearn API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    60
}

/// Student lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Domain appended to a CWL to form the stored login address.
    #[serde(default = "default_login_domain")]
    pub login_domain: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            login_domain: default_login_domain(),
        }
    }
}

fn default_login_domain() -> String {
    "ubc.ca".to_string()
}

/// Chart output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsConfig {
    /// Directory receiving the Vega-Lite documents.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Bin count of course histograms.
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            histogram_bins: default_histogram_bins(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_output_dir() -> String {
    "charts".to_string()
}

fn default_histogram_bins() -> usize {
    DEFAULT_HISTOGRAM_BINS
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.plviz.toml` from `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(ref domain) = args.login_domain {
            self.lookup.login_domain = domain.clone();
        }
        if let Some(ref dir) = args.output_dir {
            self.charts.output_dir = dir.display().to_string();
        }

        // Courses on the command line replace the configured list
        if !args.courses.is_empty() {
            self.courses = args.courses.clone();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config {
            courses: vec![CourseSpec::new("CS101", 1001)],
            ..Config::default()
        };
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
