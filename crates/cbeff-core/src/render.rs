//! Image renderer contract.
//!
//! Rendering an ISO 19794 record to a raster image happens in an external
//! service. This module defines the request the service expects and the
//! [`ImageRenderer`] trait implementations plug in behind; the core itself
//! performs no I/O.
//!
//! ```
//! use cbeff_core::render::{CompressionRatio, HealthStatus, ImageRenderer, RenderError, RenderRequest};
//!
//! struct EchoRenderer;
//!
//! impl ImageRenderer for EchoRenderer {
//!     fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
//!         Ok(request.iso_base64.clone().into_bytes())
//!     }
//!
//!     fn health(&self) -> HealthStatus {
//!         HealthStatus::Healthy { status_code: 200, message: "ok".into() }
//!     }
//! }
//! ```

use crate::encoding;
use crate::modality::{IsoVersion, Modality};
use crate::record::ExtractionResult;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Compression ratio used when the caller does not pick one
pub const DEFAULT_COMPRESSION_RATIO: u8 = 95;

/// Errors reported by an [`ImageRenderer`]
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RenderError {
    /// The request never produced a response
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message from the error body, or the status reason
        message: String,
    },

    /// The service answered successfully with no image data
    #[error("received empty image response")]
    EmptyImage,

    /// Compression ratio outside 1..=100
    #[error("compression ratio must be between 1 and 100, got {0}")]
    InvalidCompressionRatio(u8),
}

/// Image compression ratio, 1..=100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CompressionRatio(u8);

impl CompressionRatio {
    /// Validates a ratio
    pub fn new(ratio: u8) -> Result<Self, RenderError> {
        if (1..=100).contains(&ratio) {
            Ok(Self(ratio))
        } else {
            Err(RenderError::InvalidCompressionRatio(ratio))
        }
    }

    /// Returns the ratio value
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for CompressionRatio {
    fn default() -> Self {
        Self(DEFAULT_COMPRESSION_RATIO)
    }
}

impl TryFrom<u8> for CompressionRatio {
    type Error = RenderError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for CompressionRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JSON body of a render request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Modality the record was captured with
    pub modality: Modality,
    /// ISO 19794 version identifier
    pub iso_version: String,
    /// Standard base64 of the ISO record
    pub iso_base64: String,
    /// Output compression ratio
    pub compression_ratio: CompressionRatio,
}

impl RenderRequest {
    /// Builds a request from raw parts
    pub fn new(
        modality: Modality,
        iso_version: &IsoVersion,
        iso_bytes: &[u8],
        compression_ratio: CompressionRatio,
    ) -> Self {
        Self {
            modality,
            iso_version: iso_version.as_str().to_string(),
            iso_base64: encoding::encode(iso_bytes),
            compression_ratio,
        }
    }

    /// Builds a request for an extracted record
    pub fn for_result(result: &ExtractionResult, compression_ratio: CompressionRatio) -> Self {
        Self::new(
            result.modality,
            &result.iso_version,
            result.as_bytes(),
            compression_ratio,
        )
    }
}

/// Outcome of a renderer liveness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// The service answered successfully
    Healthy {
        /// HTTP status code
        status_code: u16,
        /// Response body
        message: String,
    },
    /// The service could not be reached or answered with an error
    Unhealthy {
        /// Failure description
        error: String,
    },
}

impl HealthStatus {
    /// Returns true for [`HealthStatus::Healthy`]
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy { .. })
    }
}

/// External capability turning an ISO record into encoded image bytes
pub trait ImageRenderer {
    /// Renders one record
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError>;

    /// Checks whether the renderer is reachable
    fn health(&self) -> HealthStatus;
}

/// Renders an extracted record, rejecting empty images
pub fn render_result<R: ImageRenderer + ?Sized>(
    renderer: &R,
    result: &ExtractionResult,
    compression_ratio: CompressionRatio,
) -> Result<Vec<u8>, RenderError> {
    let request = RenderRequest::for_result(result, compression_ratio);
    let image = renderer.render(&request)?;
    if image.is_empty() {
        return Err(RenderError::EmptyImage);
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    struct RecordingRenderer {
        requests: RefCell<Vec<RenderRequest>>,
        reply: Vec<u8>,
    }

    impl ImageRenderer for RecordingRenderer {
        fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
            self.requests.borrow_mut().push(request.clone());
            Ok(self.reply.clone())
        }

        fn health(&self) -> HealthStatus {
            HealthStatus::Healthy {
                status_code: 200,
                message: "Bio Utils REST Service is running".into(),
            }
        }
    }

    #[test]
    fn test_compression_ratio_bounds() {
        assert!(CompressionRatio::new(0).is_err());
        assert!(CompressionRatio::new(101).is_err());
        assert_eq!(CompressionRatio::new(1).unwrap().get(), 1);
        assert_eq!(CompressionRatio::default().get(), 95);
    }

    #[test]
    fn test_request_json_shape() {
        let result = ExtractionResult::new(vec![0x46, 0x4D, 0x52, 0x00], Modality::Finger);
        let request = RenderRequest::for_result(&result, CompressionRatio::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "modality": "FINGER",
                "isoVersion": "ISO19794_4_2011",
                "isoBase64": "Rk1SAA==",
                "compressionRatio": 95
            })
        );
    }

    #[test]
    fn test_render_result() {
        let renderer = RecordingRenderer {
            requests: RefCell::new(Vec::new()),
            reply: b"\xFF\xD8\xFF".to_vec(),
        };
        let result = ExtractionResult::new(vec![1, 2, 3], Modality::Iris);
        let image = render_result(&renderer, &result, CompressionRatio::new(80).unwrap()).unwrap();

        assert_eq!(image, b"\xFF\xD8\xFF");
        let requests = renderer.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].iso_version, "ISO19794_6_2011");
        assert_eq!(requests[0].compression_ratio.get(), 80);
        assert!(renderer.health().is_healthy());
    }

    #[test]
    fn test_render_result_empty_image() {
        let renderer = RecordingRenderer {
            requests: RefCell::new(Vec::new()),
            reply: Vec::new(),
        };
        let result = ExtractionResult::new(vec![1], Modality::Face);
        assert!(matches!(
            render_result(&renderer, &result, CompressionRatio::default()),
            Err(RenderError::EmptyImage)
        ));
    }
}
