//! Command-line front end for the order-fill harvester.
mod cli;
mod config;
mod run;

pub use cli::Cli;
pub use config::{load_file_config, AppSettings, FileConfig, OverlapArg, DEFAULT_OUTPUT};
pub use run::run;
