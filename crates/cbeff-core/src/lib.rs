//! # cbeff-core
//!
//! A library for extracting ISO 19794 biometric data blocks from CBEFF
//! (Common Biometric Exchange Formats Framework) containers.
//!
//! This crate provides the core functionality for:
//! - Detecting whether a container is CBEFF XML or (base64-wrapped) binary CBEFF
//! - Walking CBEFF XML `BIR` elements, namespace-tolerant, for one or all records
//! - Locating the BDB inside binary CBEFF with a ladder of heuristics
//! - Deriving the ISO 19794 version from the sensed modality
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`detect`]: Container classification
//! - [`xml`]: CBEFF XML extraction
//! - [`binary`]: Binary CBEFF extraction
//! - [`extract`]: Entry points and configuration
//! - [`render`]: Contract for the external image renderer
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use cbeff_core::{Container, Extractor};
//! use std::fs;
//!
//! let text = fs::read_to_string("./cbeff.xml")?;
//!
//! let extractor = Extractor::new();
//! for result in extractor.detect_and_extract(&Container::Text(&text))? {
//!     println!(
//!         "{} {} ({} bytes)",
//!         result.modality,
//!         result.iso_version,
//!         result.bdb.len()
//!     );
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`ImageRenderer`]: Plug in the service that turns records into images
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod binary;
pub mod detect;
mod encoding;
pub mod error;
pub mod extract;
pub mod modality;
pub mod record;
pub mod render;
pub mod xml;

// Re-export primary types for convenience
pub use detect::{detect_format, Container, ContainerFormat};
pub use error::{Error, Result};
pub use extract::{
    detect_and_extract, extract_all, extract_file, BirSelection, Extractor, ExtractorConfig,
};
pub use modality::{IsoVersion, Modality};
pub use record::{ExtractionResult, KeyedResult};
pub use render::{CompressionRatio, HealthStatus, ImageRenderer, RenderError, RenderRequest};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
