use fieldwork_core::{SyncEvent, SyncOrchestrator, SyncOutcome, SyncState, SyncStatus};

use crate::error::CliError;

pub async fn run_sync(orchestrator: &SyncOrchestrator) -> Result<SyncOutcome, CliError> {
    let listener = orchestrator.add_listener(|event| {
        if let Some(line) = describe_event(event) {
            println!("{line}");
        }
    });

    let outcome = orchestrator.sync_now().await;
    orchestrator.remove_listener(listener);

    if !outcome.success {
        return Err(CliError::SyncSkipped(
            outcome
                .error
                .unwrap_or_else(|| "unknown reason".to_string()),
        ));
    }

    let status = orchestrator.status().await;
    println!("Sync completed: {} synced, {} failed", outcome.synced, outcome.failed);
    println!("{}", format_status_line(&status));
    Ok(outcome)
}

/// Run the background service until Ctrl-C
pub async fn run_service(orchestrator: &SyncOrchestrator) -> Result<(), CliError> {
    orchestrator.add_listener(|event| match event {
        SyncEvent::Completed { synced, failed } => {
            tracing::info!("Sync pass completed: {} synced, {} failed", synced, failed);
        }
        SyncEvent::Error { message } => tracing::warn!("Sync error: {}", message),
        SyncEvent::Started | SyncEvent::Progress { .. } => {}
    });

    // Subscribe before polling so the first successful probe triggers a pass.
    orchestrator.start();
    let poller = orchestrator
        .monitor()
        .spawn_poller(orchestrator.queue().config().connectivity_poll_interval());

    println!("Sync service running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    poller.stop();
    orchestrator.stop();

    let status = orchestrator.status().await;
    println!("Stopped. {}", format_status_line(&status));
    Ok(())
}

fn format_status_line(status: &SyncStatus) -> String {
    format!(
        "State: {} ({} pending, {} failed, {} completed)",
        SyncState::from_status(status),
        status.queue.pending,
        status.queue.failed,
        status.queue.completed
    )
}

fn describe_event(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::Started => Some("Sync started".to_string()),
        SyncEvent::Progress {
            synced,
            failed,
            total,
        } => Some(format!("  {}/{} delivered", synced + failed, total)),
        SyncEvent::Error { message } => Some(format!("  error: {message}")),
        SyncEvent::Completed { .. } => None,
    }
}
