use chrono::Utc;
use fieldwork_core::{OperationType, QueueItemId, QueueManager};
use serde_json::{json, Value};

use crate::error::CliError;

pub async fn run_enqueue(
    queue: &QueueManager,
    operation: &str,
    payload: &str,
) -> Result<QueueItemId, CliError> {
    let operation = operation.parse::<OperationType>()?;
    let payload = parse_payload(payload)?;

    let id = queue.enqueue(operation, payload).await;
    println!("{id}");
    Ok(id)
}

pub async fn run_location(
    queue: &QueueManager,
    lat: f64,
    lng: f64,
    accuracy: Option<f64>,
    session_id: Option<&str>,
) -> Result<QueueItemId, CliError> {
    let payload = location_payload(lat, lng, accuracy, session_id)?;
    let id = queue.enqueue(OperationType::UpdateLocation, payload).await;
    println!("{id}");
    Ok(id)
}

fn parse_payload(raw: &str) -> Result<Value, CliError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|error| CliError::InvalidPayload(error.to_string()))
}

fn location_payload(
    lat: f64,
    lng: f64,
    accuracy: Option<f64>,
    session_id: Option<&str>,
) -> Result<Value, CliError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CliError::InvalidPayload(format!(
            "latitude {lat} is outside -90..90"
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(CliError::InvalidPayload(format!(
            "longitude {lng} is outside -180..180"
        )));
    }
    if accuracy.is_some_and(|meters| meters < 0.0 || !meters.is_finite()) {
        return Err(CliError::InvalidPayload(
            "accuracy must be a non-negative number of meters".to_string(),
        ));
    }

    let now = Utc::now();
    let mut payload = json!({
        "lat": lat,
        "lng": lng,
        "timestamp": now.timestamp_millis(),
        "recorded_at": now.to_rfc3339(),
    });
    if let Some(accuracy) = accuracy {
        payload["accuracy"] = json!(accuracy);
    }
    if let Some(session_id) = session_id.map(str::trim).filter(|id| !id.is_empty()) {
        payload["session_id"] = json!(session_id);
    }
    Ok(payload)
}
