//! HTTP senders and reachability probe for the fieldwork backend.

use std::sync::Arc;
use std::time::Duration;

use fieldwork_core::connectivity::ReachabilityProbe;
use fieldwork_core::sync::{RemoteSender, SendError, SendResult};
use fieldwork_core::util::compact_text;
use fieldwork_core::{OperationType, SenderRegistry};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::config::normalize_base_url;
use crate::error::CliError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared HTTP client bound to one backend
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, CliError> {
        let base_url = normalize_base_url(base_url).map_err(CliError::Config)?;
        Ok(Self {
            base_url,
            auth_token,
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }

    /// One sender per operation type, all sharing this client
    pub fn sender_registry(&self) -> SenderRegistry {
        let api = Arc::new(self.clone());
        OperationType::ALL
            .into_iter()
            .fold(SenderRegistry::new(), |registry, operation| {
                registry.register(
                    operation,
                    OperationSender {
                        api: Arc::clone(&api),
                        operation,
                    },
                )
            })
    }

    pub fn health_probe(&self) -> HealthProbe {
        HealthProbe { api: self.clone() }
    }

    async fn deliver(&self, operation: OperationType, payload: &serde_json::Value) -> SendResult {
        let (method, path) = endpoint_for(operation, payload)?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .request(method, &url)
            .header("Accept", "application/json")
            .json(payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|error| SendError::Unavailable(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Rejected {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        tracing::debug!("Delivered {} to {}", operation, url);
        Ok(())
    }
}

/// Delivers one operation type through an [`ApiClient`]
struct OperationSender {
    api: Arc<ApiClient>,
    operation: OperationType,
}

impl RemoteSender for OperationSender {
    fn send<'a>(&'a self, payload: &'a serde_json::Value) -> BoxFuture<'a, SendResult> {
        self.api.deliver(self.operation, payload).boxed()
    }
}

/// Treats any HTTP answer from `/health` as online
pub struct HealthProbe {
    api: ApiClient,
}

impl ReachabilityProbe for HealthProbe {
    fn check(&self) -> BoxFuture<'_, bool> {
        async move {
            let url = format!("{}/health", self.api.base_url);
            match self.api.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
                Ok(_) => true,
                Err(error) => {
                    tracing::debug!("Health check failed: {}", error);
                    false
                }
            }
        }
        .boxed()
    }
}

/// HTTP method and path for an operation
pub fn endpoint_for(
    operation: OperationType,
    payload: &serde_json::Value,
) -> Result<(Method, String), SendError> {
    let endpoint = match operation {
        OperationType::UpdateLocation => (Method::POST, "/api/locations".to_string()),
        OperationType::StartSession => (Method::POST, "/api/sessions".to_string()),
        OperationType::EndSession => (
            Method::POST,
            format!("/api/sessions/{}/end", session_id(payload)?),
        ),
        OperationType::UpdateSession => (
            Method::PATCH,
            format!("/api/sessions/{}", session_id(payload)?),
        ),
        OperationType::UploadPhoto => (Method::POST, "/api/photos".to_string()),
    };
    Ok(endpoint)
}

fn session_id(payload: &serde_json::Value) -> Result<String, SendError> {
    match payload.get("session_id") {
        Some(serde_json::Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
        _ => Err(SendError::InvalidPayload(
            "payload is missing session_id".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed
    }
}
