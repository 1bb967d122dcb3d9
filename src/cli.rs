//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::aggregator::CourseSpec;
use crate::ids::CourseId;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// plviz - grade aggregation and charts for PrairieLearn courses
///
/// Fetches rosters, assessments and scores for one or more course
/// instances, merges students shared between them, and writes summary
/// statistics and Vega-Lite charts.
///
/// Examples:
///   plviz --instance CS101=1001 --instance MATH201=1002 summary
///   plviz roster --course CS101
///   plviz boxplot --course CS101 --label HW1,HW2
///   plviz student --cwl jdoe --filter-course CS101
///   plviz --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .plviz.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// PrairieLearn API token, sent as the Private-Token header
    #[arg(long, env = "PL_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Course instance to aggregate, as CODE=ID (repeatable)
    ///
    /// Replaces the [[courses]] list of the config file when given.
    #[arg(
        long = "instance",
        value_name = "CODE=ID",
        value_parser = parse_course_spec,
        global = true
    )]
    pub courses: Vec<CourseSpec>,

    /// PrairieLearn API root URL
    #[arg(long, env = "PL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Domain appended to a CWL to form the login address
    #[arg(long, value_name = "DOMAIN", global = true)]
    pub login_domain: Option<String>,

    /// Directory for chart output
    #[arg(short, long, value_name = "DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .plviz.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print summary statistics for every assessment
    Summary {
        /// Only this course (default: all configured courses)
        #[arg(long, value_name = "CODE")]
        course: Option<String>,
    },

    /// List the students enrolled in a course
    Roster {
        #[arg(long, value_name = "CODE")]
        course: String,
    },

    /// Write a boxplot of score distributions
    Boxplot {
        #[arg(long, value_name = "CODE")]
        course: String,

        /// Assessment labels to include (comma-separated; default: all)
        #[arg(long = "label", value_name = "LABELS", value_delimiter = ',')]
        labels: Option<Vec<String>>,
    },

    /// Write a layered histogram of score distributions
    Histogram {
        #[arg(long, value_name = "CODE")]
        course: String,

        /// Assessment labels to include (comma-separated; default: all)
        #[arg(long = "label", value_name = "LABELS", value_delimiter = ',')]
        labels: Option<Vec<String>>,

        /// Maximum number of bins (default: from config)
        #[arg(long, value_name = "COUNT")]
        bins: Option<usize>,
    },

    /// Write a histogram of one assessment's scores
    Assessment {
        #[arg(long, value_name = "CODE")]
        course: String,

        #[arg(long, value_name = "LABEL")]
        label: String,
    },

    /// Look up students and chart their grades across courses
    Student {
        /// Display names to look up (comma-separated)
        #[arg(long = "name", value_name = "NAMES", value_delimiter = ',')]
        names: Vec<String>,

        /// CWLs to look up (comma-separated)
        #[arg(long = "cwl", value_name = "CWLS", value_delimiter = ',')]
        cwls: Vec<String>,

        /// Only chart grades from these course codes
        #[arg(long = "filter-course", value_name = "CODES", value_delimiter = ',')]
        filter_courses: Option<Vec<String>>,

        /// Only chart grades with these assessment labels
        #[arg(long = "filter-label", value_name = "LABELS", value_delimiter = ',')]
        filter_labels: Option<Vec<String>>,
    },
}

/// Parses `CODE=ID`.
pub fn parse_course_spec(value: &str) -> Result<CourseSpec, String> {
    let (code, id) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=ID, got '{}'", value))?;

    let code = code.trim();
    if code.is_empty() {
        return Err(format!("missing course code in '{}'", value));
    }

    let id: u64 = id
        .trim()
        .parse()
        .map_err(|_| format!("course id must be a number in '{}'", value))?;

    Ok(CourseSpec {
        code: code.to_string(),
        id: CourseId(id),
    })
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("No command given; see --help".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(Command::Histogram { bins: Some(0), .. }) = self.command {
            return Err("Bins must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
