use anyhow::{Context, Result};
use fills_engine::{ensure_output_dir, CsvRecordStore, GraphqlSource, HarvestOutcome, Harvester};
use fills_logging::{fills_info, fills_warn};
use tokio_util::sync::CancellationToken;

use crate::AppSettings;

/// Recover, harvest until caught up or cancelled, and log the summary.
pub async fn run(settings: &AppSettings, cancel: CancellationToken) -> Result<HarvestOutcome> {
    if let Some(parent) = settings.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_output_dir(parent)
            .with_context(|| format!("preparing output directory {}", parent.display()))?;
    }

    let source = GraphqlSource::new(settings.fetch.clone())
        .with_context(|| format!("configuring endpoint {}", settings.fetch.endpoint))?;
    let store = CsvRecordStore::new(&settings.output);
    let mut harvester =
        Harvester::new(source, store, settings.harvest.clone()).with_cancellation(cancel);

    let outcome = harvester
        .harvest()
        .await
        .with_context(|| format!("harvesting into {}", settings.output.display()))?;

    if outcome.cancelled() {
        fills_warn!("Harvest interrupted at {}", outcome.cursor);
    }
    fills_info!("Finished scraping orderFilledEvents");
    fills_info!("Total new records: {}", outcome.appended());
    fills_info!("Output file: {}", settings.output.display());
    Ok(outcome)
}
