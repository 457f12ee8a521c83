use std::sync::Arc;

use fieldwork_core::{
    ConnectivityMonitor, QueueItem, QueueManager, SqliteKeyValueStore, SyncOrchestrator,
};

use crate::config::{Settings, API_URL_ENV};
use crate::error::CliError;
use crate::http::ApiClient;

pub async fn open_queue(settings: &Settings) -> Result<QueueManager, CliError> {
    let db_path = settings.db_path();
    let kv = SqliteKeyValueStore::open(&db_path)?;
    tracing::debug!("Using queue database at {}", db_path.display());
    Ok(QueueManager::open(Arc::new(kv), settings.sync.clone()).await?)
}

/// Wire the queue to the configured backend
pub fn build_orchestrator(
    settings: &Settings,
    queue: QueueManager,
) -> Result<SyncOrchestrator, CliError> {
    let base_url = settings.api_base_url.as_deref().ok_or_else(|| {
        CliError::Config(format!(
            "No API URL configured. Pass --api-url, set {API_URL_ENV} or run `fieldwork config init`."
        ))
    })?;

    let api = ApiClient::new(base_url, settings.auth_token.clone())?;
    let monitor = ConnectivityMonitor::with_probe(Arc::new(api.health_probe()));
    Ok(SyncOrchestrator::new(queue, monitor, api.sender_registry()))
}

pub fn format_item_lines(items: &[QueueItem], now_ms: i64) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let mut line = format!(
                "{}  {:<10}  {:<15}  retries={}  {}",
                item.id,
                item.status.as_str(),
                item.operation_type.as_str(),
                item.retry_count,
                format_relative_time(item.created_at, now_ms)
            );
            if let Some(error) = &item.last_error {
                line.push_str("  ");
                line.push_str(error);
            }
            line
        })
        .collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff_seconds = (now_ms - timestamp_ms).max(0) / 1000;

    if diff_seconds < 60 {
        return "just now".to_string();
    }

    let diff_minutes = diff_seconds / 60;
    if diff_minutes < 60 {
        return format!("{diff_minutes}m ago");
    }

    let diff_hours = diff_minutes / 60;
    if diff_hours < 24 {
        return format!("{diff_hours}h ago");
    }

    format!("{}d ago", diff_hours / 24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldwork_core::{OperationType, QueueStatus, SyncConfig};
    use serde_json::json;

    fn settings_in(dir: &std::path::Path, api_base_url: Option<&str>) -> Settings {
        Settings {
            api_base_url: api_base_url.map(ToString::to_string),
            auth_token: None,
            data_dir: dir.to_path_buf(),
            sync: SyncConfig::default(),
        }
    }

    #[test]
    fn format_relative_time_units() {
        let now = 10_000_000;
        assert_eq!(format_relative_time(now - 30_000, now), "just now");
        assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
        assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
        assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
    }

    #[test]
    fn format_item_lines_includes_last_error() {
        let mut item = QueueItem::new(OperationType::UploadPhoto, json!({}));
        item.status = QueueStatus::Failed;
        item.retry_count = 2;
        item.last_error = Some("HTTP 500".to_string());

        let lines = format_item_lines(&[item.clone()], item.created_at);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(&item.id.to_string()));
        assert!(lines[0].contains("failed"));
        assert!(lines[0].contains("upload_photo"));
        assert!(lines[0].contains("retries=2"));
        assert!(lines[0].ends_with("HTTP 500"));
    }

    #[tokio::test]
    async fn open_queue_creates_database_in_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(&tmp.path().join("data"), None);

        let queue = open_queue(&settings).await.unwrap();
        queue.enqueue(OperationType::StartSession, json!({})).await;
        assert!(settings.db_path().exists());

        let reopened = open_queue(&settings).await.unwrap();
        assert_eq!(reopened.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn build_orchestrator_requires_api_url() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_in(tmp.path(), None);
        let queue = open_queue(&settings).await.unwrap();

        let result = build_orchestrator(&settings, queue);
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
