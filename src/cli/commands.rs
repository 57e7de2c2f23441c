use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use crate::job::{JobStatus, Sensor};

#[derive(Parser)]
#[command(name = "geowatch")]
#[command(author, version, about = "Environmental monitoring mission orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Data directory holding jobs, logs and config.toml
    #[arg(long, global = true, env = "GEOWATCH_DATA_DIR", default_value = ".geowatch")]
    pub data_dir: PathBuf,

    /// Configuration file (default: <data-dir>/config.toml)
    #[arg(long, global = true, env = "GEOWATCH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Output format for CLI results.
/// - Text: Human-readable text output (default)
/// - Json: One JSON document per command
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a new mission
    Submit {
        /// Region as min_lon,min_lat,max_lon,max_lat
        #[arg(long, allow_hyphen_values = true)]
        bbox: String,

        /// Search window length in days ending now
        #[arg(
            long,
            default_value = "30",
            value_parser = clap::value_parser!(u32).range(1..),
            conflicts_with_all = ["start", "end"]
        )]
        days: u32,

        /// Window start (RFC 3339)
        #[arg(long, requires = "end")]
        start: Option<DateTime<Utc>>,

        /// Window end (RFC 3339)
        #[arg(long, requires = "start")]
        end: Option<DateTime<Utc>>,

        #[arg(long, value_enum, default_value = "optical")]
        sensor: SensorArg,

        /// Register as a daily recurring definition
        #[arg(long)]
        daily: bool,

        /// Execute immediately after submitting
        #[arg(long, conflicts_with = "daily")]
        run: bool,
    },

    /// Execute a pending job now
    Run {
        /// Job ID
        job_id: String,
    },

    /// List all jobs
    List {
        /// Filter by status
        #[arg(long, value_enum)]
        status: Option<StatusFilterArg>,
    },

    /// Show job status
    Status {
        /// Job ID
        job_id: String,
    },

    /// Run the recurring scheduler until interrupted
    Schedule {
        /// Run a single check cycle and wait for dispatched runs
        #[arg(long)]
        once: bool,
    },

    /// Run a grid campaign around a center point
    Supervise {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Number of grid cells (default from config)
        #[arg(long)]
        count: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SensorArg {
    Optical,
    Radar,
}

impl From<SensorArg> for Sensor {
    fn from(arg: SensorArg) -> Self {
        match arg {
            SensorArg::Optical => Self::Optical,
            SensorArg::Radar => Self::Radar,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilterArg {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<StatusFilterArg> for JobStatus {
    fn from(arg: StatusFilterArg) -> Self {
        match arg {
            StatusFilterArg::Pending => Self::Pending,
            StatusFilterArg::Running => Self::Running,
            StatusFilterArg::Completed => Self::Completed,
            StatusFilterArg::Failed => Self::Failed,
        }
    }
}
