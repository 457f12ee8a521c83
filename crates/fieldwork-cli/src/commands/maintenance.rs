use fieldwork_core::{QueueItemId, QueueManager};

use crate::error::CliError;

pub async fn run_retry(queue: &QueueManager) -> usize {
    let reset = queue.retry_failed().await;
    println!("Re-queued {reset} failed item(s)");
    reset
}

pub async fn run_gc(queue: &QueueManager, days: Option<u32>) -> usize {
    let days = days.unwrap_or(queue.config().completed_retention_days);
    let removed = queue.clear_completed(days).await;
    println!("Removed {removed} completed item(s) older than {days} day(s)");
    removed
}

pub async fn run_remove(queue: &QueueManager, id: &str) -> Result<(), CliError> {
    let item_id = id
        .parse::<QueueItemId>()
        .map_err(|_| CliError::ItemNotFound(id.trim().to_string()))?;

    if !queue.remove_item(&item_id).await {
        return Err(CliError::ItemNotFound(item_id.to_string()));
    }
    println!("Removed {item_id}");
    Ok(())
}

pub async fn run_clear(queue: &QueueManager, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ClearNotConfirmed);
    }

    let total = queue.stats().await.total;
    queue.clear_all().await;
    println!("Cleared {total} item(s)");
    Ok(())
}
