//! HTTP client for the dashboard backend.
//!
//! Thin `reqwest` wrapper implementing [`ApiTransport`]. Every response that
//! arrives is handed back as-is; only transport failures become errors.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{ApiRequest, ApiResponse, ApiTransport};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use stockroom_types::HttpMethod;
use tracing::debug;

/// HTTP client for the backend JSON API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[async_trait]
impl ApiTransport for ApiClient {
    async fn execute(&self, request: &ApiRequest) -> SyncResult<ApiResponse> {
        let url = self.url(&request.endpoint);
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            debug!("{} {} unreachable: {e}", request.method, request.endpoint);
            SyncError::Unreachable(e.to_string())
        })?;

        let status = resp.status().as_u16();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SyncError::Unreachable(format!("reading response body: {e}")))?;

        debug!("{} {} -> {status}", request.method, request.endpoint);
        Ok(ApiResponse::new(status, parse_body(&bytes)))
    }
}
