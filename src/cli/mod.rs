//! Command-line interface definitions.
//!
//! - `Cli`, `Commands`: CLI argument definitions via clap
//! - `Display`: Formatted terminal output with colors and status

mod commands;
mod display;

pub use commands::{Cli, Commands, ConfigAction, OutputFormat, SensorArg, StatusFilterArg};
pub use display::Display;
