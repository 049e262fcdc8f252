// Run one training / transfer / prediction batch to completion
use crate::error::Result;
use crate::orchestrator::{
    drive, event_channel, Frontend, Orchestrator, OrchestratorConfig, ProcessExecutor, RunSummary, UiEvent,
};
use crate::models::RunMode;
use log::{info, warn};

/// Submit `items` and drive the orchestrator until the summary has been shown.
/// Ctrl-C cancels the run; the summary still reports what finished.
pub async fn run_batch<F: Frontend>(
    frontend: F,
    config: OrchestratorConfig,
    mode: RunMode,
    items: Vec<String>,
) -> Result<RunSummary> {
    let (events, mut receiver) = event_channel();
    let mut orchestrator = Orchestrator::new(frontend, ProcessExecutor, config, events.clone());

    orchestrator.submit(mode, items)?;

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            let _ = events.send(UiEvent::Cancel);
        }
    });

    if !orchestrator.is_idle() {
        drive(&mut orchestrator, &mut receiver, true).await;
    }
    interrupt.abort();

    let summary = orchestrator
        .last_summary()
        .cloned()
        .unwrap_or_else(|| RunSummary::new(mode));
    info!("{} run {} finished", mode.label(), summary.run_id);
    Ok(summary)
}
