use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fills_app::{load_file_config, run, AppSettings, Cli};
use fills_engine::HarvestOutcome;
use fills_logging::{fills_error, fills_warn};
use tokio_util::sync::CancellationToken;

fn main() -> ExitCode {
    let cli = Cli::parse();
    fills_logging::initialize(cli.log_destination(), cli.log_level());

    let file = cli
        .config
        .as_deref()
        .map(load_file_config)
        .unwrap_or_default();
    let settings = AppSettings::resolve(&cli, file);

    match run_blocking(&settings) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            fills_error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_blocking(settings: &AppSettings) -> Result<HarvestOutcome> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                fills_warn!("Interrupt received, stopping harvest");
                on_interrupt.cancel();
            }
        });
        run(settings, cancel).await
    })
}
