//! `unical watch`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use unical_sync::SyncOrchestrator;

use crate::error::ClientResult;
use crate::{output, setup};

/// Authenticates the registered adapters, syncs now, then syncs on every tick
/// of the auto-sync timer, printing sync signals and auth changes until
/// Ctrl-C.
pub async fn run(orchestrator: Arc<SyncOrchestrator>, interval: Option<Duration>) -> ClientResult<()> {
    if let Some(interval) = interval {
        orchestrator.set_auto_sync_interval(interval);
    }
    let mut sync_events = orchestrator.subscribe_sync();
    let mut auth_events = orchestrator.subscribe_auth();
    setup::authenticate_all(&orchestrator).await;

    info!(
        interval_secs = orchestrator.auto_sync_interval().as_secs(),
        "watching"
    );
    orchestrator.set_auto_sync_enabled(true);

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.sync_all().await })
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
            event = sync_events.recv() => match event {
                Ok(event) => println!("{}", output::render_sync_event(&event)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "sync events dropped"),
                Err(RecvError::Closed) => break,
            },
            event = auth_events.recv() => match event {
                Ok(event) => println!("auth: {event:?}"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "auth events dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    first.abort();
    orchestrator.set_auto_sync_enabled(false);
    info!("watch stopped");
    Ok(())
}
