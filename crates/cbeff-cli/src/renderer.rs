//! HTTP client for the bio-utils rendering service.

use cbeff_core::render::{HealthStatus, ImageRenderer, RenderError, RenderRequest};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Path of the conversion endpoint below the base URL
const CONVERT_PATH: &str = "/bio-utils/iso-to-image";

/// Path of the liveness endpoint below the base URL
const HEALTH_PATH: &str = "/bio-utils/health";

/// Error body returned by the service on failure
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Renders ISO records through `POST {base}/bio-utils/iso-to-image`
pub struct HttpRenderer {
    base_url: String,
    http_client: Client,
}

impl HttpRenderer {
    /// Creates a renderer for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RenderError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenderError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Extracts the `message` field from a JSON error body, if there is one
    fn error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
        serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            })
    }
}

impl ImageRenderer for HttpRenderer {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let url = self.endpoint(CONVERT_PATH);
        debug!(
            "POST {} ({} {}, ratio {})",
            url, request.modality, request.iso_version, request.compression_ratio
        );

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| RenderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .map_err(|e| RenderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RenderError::Status {
                status: status.as_u16(),
                message: Self::error_message(status, &body),
            });
        }
        if body.is_empty() {
            return Err(RenderError::EmptyImage);
        }

        info!("Rendered {} image bytes", body.len());
        Ok(body.to_vec())
    }

    fn health(&self) -> HealthStatus {
        let url = self.endpoint(HEALTH_PATH);
        let response = self
            .http_client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status());

        match response {
            Ok(resp) => {
                let status_code = resp.status().as_u16();
                HealthStatus::Healthy {
                    status_code,
                    message: resp.text().unwrap_or_default(),
                }
            }
            Err(e) => HealthStatus::Unhealthy {
                error: e.to_string(),
            },
        }
    }
}
