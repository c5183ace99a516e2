use super::SourceFlags;
use crate::config::Config;
use crate::error::Result;
use crate::models::RunSummary;
use crate::sync::CancelFlag;
use tracing::{info, warn};

pub async fn execute(flags: &SourceFlags) -> Result<()> {
    let sources = flags.enabled();
    if sources.is_empty() {
        warn!("All sources disabled, nothing to sync");
        return Ok(());
    }

    let config = Config::load()?;
    let engine = super::build_engine(&config).await?;

    let summary = engine.run_all(&sources, &CancelFlag::new()).await;
    log_summary(&summary);

    if !summary.all_completed() {
        return Err(anyhow::anyhow!("one or more sources failed to sync").into());
    }

    Ok(())
}

pub(super) fn log_summary(summary: &RunSummary) {
    for report in &summary.reports {
        for error in &report.errors {
            warn!(
                source = report.source_id,
                stage = %error.stage,
                record_id = ?error.record_id,
                "{}",
                error.message
            );
        }
        if report.is_clean() {
            info!(
                source = report.source_id,
                fetched = report.records_fetched,
                loaded = report.records_loaded,
                duration_ms = report.duration.as_millis() as u64,
                "Source synced"
            );
        } else if report.completed {
            warn!(
                source = report.source_id,
                fetched = report.records_fetched,
                loaded = report.records_loaded,
                excluded = report.errors.len(),
                "Source synced with records excluded"
            );
        } else {
            warn!(
                source = report.source_id,
                fetched = report.records_fetched,
                loaded = report.records_loaded,
                "Source sync did not complete"
            );
        }
    }
}
