//! Network seam between the dispatcher and the backend.

use crate::error::SyncResult;
use async_trait::async_trait;
use serde_json::Value;
use stockroom_types::{HttpMethod, QueuedOperation};

/// One backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the API base URL, e.g. `/api/inventory`.
    pub endpoint: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            endpoint: endpoint.into(),
            body: None,
        }
    }

    pub fn new(method: HttpMethod, endpoint: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body,
        }
    }
}

impl From<&QueuedOperation> for ApiRequest {
    fn from(op: &QueuedOperation) -> Self {
        let body = match &op.data {
            Value::Null => None,
            data => Some(data.clone()),
        };
        Self::new(op.method, op.endpoint.clone(), body)
    }
}

/// A response the backend actually sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_ok_status(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 2xx and not an explicit `{"success": false}` envelope.
    pub fn indicates_success(&self) -> bool {
        self.is_ok_status() && self.body.get("success") != Some(&Value::Bool(false))
    }

    /// Best human-readable reason from an error envelope.
    pub fn error_message(&self) -> String {
        ["error", "message"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| match &self.body {
                Value::String(s) if !s.is_empty() => s.clone(),
                _ => format!("HTTP {}", self.status),
            })
    }
}

/// Executes backend calls.
///
/// Implementations return `SyncError::Unreachable` when no response was
/// received and `Ok` for every response that arrived, whatever its status.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> SyncResult<ApiResponse>;
}
