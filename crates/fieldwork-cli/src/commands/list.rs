use fieldwork_core::util::unix_millis_now;
use fieldwork_core::{QueueItem, QueueManager, QueueStats, QueueStatus};

use crate::commands::common::format_item_lines;
use crate::error::CliError;

pub async fn run_stats(queue: &QueueManager, as_json: bool) -> Result<(), CliError> {
    let stats = queue.stats().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in format_stats_lines(&stats) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_list(
    queue: &QueueManager,
    status: Option<QueueStatus>,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let items = filter_items(queue.items().await, status, limit);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    for line in format_item_lines(&items, unix_millis_now()) {
        println!("{line}");
    }
    Ok(())
}

fn filter_items(
    items: Vec<QueueItem>,
    status: Option<QueueStatus>,
    limit: usize,
) -> Vec<QueueItem> {
    items
        .into_iter()
        .filter(|item| status.is_none_or(|status| item.status == status))
        .take(limit)
        .collect()
}

fn format_stats_lines(stats: &QueueStats) -> Vec<String> {
    vec![
        format!("total:      {}", stats.total),
        format!("pending:    {}", stats.pending),
        format!("processing: {}", stats.processing),
        format!("failed:     {}", stats.failed),
        format!("completed:  {}", stats.completed),
    ]
}
