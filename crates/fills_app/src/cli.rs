use std::path::PathBuf;

use clap::Parser;
use fills_logging::LogDestination;
use log::LevelFilter;

use crate::config::OverlapArg;

/// Harvest Polymarket order-filled events into an append-only CSV file.
#[derive(Debug, Clone, Parser)]
#[command(name = "fills-harvester", version)]
pub struct Cli {
    /// Events requested per page [default: 1000]
    #[arg(long, env = "FILLS_AT_ONCE")]
    pub at_once: Option<usize>,

    /// Record store path [default: goldsky/orderFilled.csv]
    #[arg(long, env = "FILLS_OUTPUT")]
    pub output: Option<PathBuf>,

    /// GraphQL endpoint of the orderbook subgraph
    #[arg(long, env = "FILLS_ENDPOINT")]
    pub endpoint: Option<String>,

    /// RON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seconds to wait between attempts of a failed query [default: 5]
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,

    /// Give up after this many attempts of one query (unbounded if unset)
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// How rows re-fetched after a resume are matched against the store
    #[arg(long, value_enum)]
    pub overlap: Option<OverlapArg>,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    pub fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
