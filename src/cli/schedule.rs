use super::SourceFlags;
use super::once::log_summary;
use crate::config::Config;
use crate::error::Result;
use crate::sync::CancelFlag;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Run cycles forever at the configured interval. Ctrl-C cancels the
/// in-flight run at the next page or chunk boundary and stops the loop.
pub async fn execute(flags: &SourceFlags, interval_override: Option<u64>) -> Result<()> {
    let sources = flags.enabled();
    if sources.is_empty() {
        warn!("All sources disabled, nothing to sync");
        return Ok(());
    }

    let config = Config::load()?;
    let engine = super::build_engine(&config).await?;
    let minutes = interval_override
        .unwrap_or(config.sync.interval_minutes)
        .max(1);

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after current work");
                cancel.cancel();
            }
        });
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(minutes * 60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        interval_minutes = minutes,
        sources = sources.len(),
        "Starting scheduled sync"
    );

    loop {
        // First tick fires immediately, so the first cycle runs at startup
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        let summary = engine.run_all(&sources, &cancel).await;
        log_summary(&summary);

        if cancel.is_cancelled() {
            break;
        }
    }

    info!("Scheduler stopped");
    Ok(())
}
