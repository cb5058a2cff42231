//! Command-line front end for monitor trace analysis.

pub mod config;
pub mod mode;

pub use config::{Command, NamesFile, Options, RunConfig};
pub use mode::{analyse, list_metrics, list_modes, load_names, run, Analysis, OutputMode};
