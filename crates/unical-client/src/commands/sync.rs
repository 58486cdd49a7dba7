//! `unical sync`

use tracing::info;
use unical_core::Provider;
use unical_sync::SyncOrchestrator;

use crate::error::{ClientError, ClientResult};
use crate::output;

/// Runs one cycle over every adapter, or just `provider`.
pub async fn run(
    orchestrator: &SyncOrchestrator,
    provider: Option<Provider>,
    json: bool,
) -> ClientResult<()> {
    let summary = match provider {
        Some(provider) => orchestrator.sync_platform(provider).await?,
        None => orchestrator.sync_all().await,
    }
    .ok_or_else(|| ClientError::Usage("a sync is already running".to_string()))?;

    info!(events = summary.events, tasks = summary.tasks, "sync finished");
    if json {
        println!("{}", output::to_json(&summary));
    } else {
        println!("{}", output::render_summary(&summary));
    }
    Ok(())
}
