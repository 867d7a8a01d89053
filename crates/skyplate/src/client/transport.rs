//! HTTP exchange and response normalization.
//!
//! `HttpExchange` is the raw byte-level seam (reqwest in production, scripted
//! in tests). `Transport` sits on top of it and turns every response into
//! either a JSON object or a typed `ClientError`, exactly once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::encoder::{EncodedRequest, RequestEnvelope};
use crate::config::HttpConfig;
use crate::error::ClientError;
use crate::sanitize;

/// Placeholder used when an error response carries no `errormessage`.
const MISSING_ERROR_MESSAGE: &str = "(none)";

/// Status code and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single HTTP exchange. No retries.
#[async_trait]
pub trait HttpExchange: Send + Sync {
    /// POSTs an encoded API request.
    async fn post(&self, url: &str, request: EncodedRequest) -> Result<RawResponse, String>;

    /// GETs a plain resource (result files).
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<RawResponse, String>;
}

/// Production exchange backed by reqwest.
pub struct ReqwestExchange {
    client: Client,
}

impl ReqwestExchange {
    pub fn new(config: &HttpConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("skyplate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Network {
                service: "<client>".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn post(&self, url: &str, request: EncodedRequest) -> Result<RawResponse, String> {
        let mut builder = self.client.post(url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| e.to_string())?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }

    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<RawResponse, String> {
        let mut builder = self.client.get(url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| e.to_string())?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Executes encoded calls against the service base URL.
#[derive(Clone)]
pub struct Transport {
    base_url: String,
    exchange: Arc<dyn HttpExchange>,
    diagnostics_dir: Option<PathBuf>,
}

impl Transport {
    /// `base_url` is normalized to end with a slash so service paths append.
    pub fn new(base_url: &str, exchange: Arc<dyn HttpExchange>) -> Self {
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            exchange,
            diagnostics_dir: None,
        }
    }

    /// Directory where bodies of failed HTTP exchanges are written.
    pub fn with_diagnostics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.diagnostics_dir = Some(dir.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, service: &str) -> String {
        format!("{}{}", self.base_url, service.trim_start_matches('/'))
    }

    /// Sends an envelope and returns the successful JSON object.
    pub async fn send(&self, envelope: &RequestEnvelope) -> Result<Value, ClientError> {
        let service = envelope.service();
        let url = self.url_for(service);
        let request = envelope.encode()?;

        debug!(
            "Calling {} ({} bytes, payload: {})",
            sanitize::redact_url(&url),
            request.body.len(),
            envelope.has_payload()
        );

        let response = self
            .exchange
            .post(&url, request)
            .await
            .map_err(|message| ClientError::Network {
                service: service.to_string(),
                message,
            })?;

        interpret_response(service, response, self.diagnostics_dir.as_deref())
    }

    /// Sends an envelope and decodes the successful object into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        envelope: &RequestEnvelope,
    ) -> Result<T, ClientError> {
        let value = self.send(envelope).await?;
        decode(envelope.service(), value)
    }

    /// Downloads a non-API resource, keeping its raw bytes.
    pub async fn fetch_bytes(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<u8>, ClientError> {
        let response = self
            .exchange
            .get(url, headers)
            .await
            .map_err(|message| ClientError::Network {
                service: url.to_string(),
                message,
            })?;

        if !response.is_success() {
            let diagnostic = self
                .diagnostics_dir
                .as_deref()
                .and_then(|dir| write_diagnostic(dir, url, &response.body));
            return Err(ClientError::Http {
                service: url.to_string(),
                status: response.status,
                diagnostic,
            });
        }

        Ok(response.body)
    }
}

/// Decodes a successful JSON object into an endpoint's typed response.
pub fn decode<T: DeserializeOwned>(service: &str, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse {
        service: service.to_string(),
        reason: e.to_string(),
    })
}

/// Normalizes a raw response into a JSON value or a typed failure.
pub fn interpret_response(
    service: &str,
    response: RawResponse,
    diagnostics_dir: Option<&Path>,
) -> Result<Value, ClientError> {
    if !response.is_success() {
        let diagnostic =
            diagnostics_dir.and_then(|dir| write_diagnostic(dir, service, &response.body));
        return Err(ClientError::Http {
            service: service.to_string(),
            status: response.status,
            diagnostic,
        });
    }

    let value: Value =
        serde_json::from_slice(&response.body).map_err(|e| ClientError::MalformedResponse {
            service: service.to_string(),
            reason: format!("body is not JSON: {}", e),
        })?;

    if !value.is_object() {
        return Err(ClientError::MalformedResponse {
            service: service.to_string(),
            reason: "body is not a JSON object".to_string(),
        });
    }

    if value.get("status").and_then(Value::as_str) == Some("error") {
        let message = value
            .get("errormessage")
            .and_then(Value::as_str)
            .unwrap_or(MISSING_ERROR_MESSAGE)
            .to_string();
        return Err(ClientError::Server {
            service: service.to_string(),
            message,
        });
    }

    Ok(value)
}

/// Writes an error body for operator inspection, returning where it went.
fn write_diagnostic(dir: &Path, service: &str, body: &[u8]) -> Option<PathBuf> {
    let slug: String = service
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(48)
        .collect();
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
    let path = dir.join(format!("err-{}-{}.html", slug, stamp));

    if let Err(e) = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, body)) {
        warn!("Failed to write diagnostic body to {}: {}", path.display(), e);
        return None;
    }

    warn!("Wrote error response body to {}", path.display());
    Some(path)
}
