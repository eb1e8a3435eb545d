//! Extraction output types.

use crate::modality::{IsoVersion, Modality};
use bytes::Bytes;

/// One recovered biometric record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// The raw ISO 19794 record (never empty)
    pub bdb: Bytes,
    /// Sensed modality
    pub modality: Modality,
    /// ISO 19794 version the record is rendered with
    pub iso_version: IsoVersion,
}

impl ExtractionResult {
    /// Creates a result whose version is derived from the modality
    pub fn new(bdb: impl Into<Bytes>, modality: Modality) -> Self {
        Self {
            bdb: bdb.into(),
            modality,
            iso_version: modality.iso_version(),
        }
    }

    /// Replaces the derived version with a caller-supplied one
    pub fn with_iso_version(mut self, iso_version: IsoVersion) -> Self {
        self.iso_version = iso_version;
        self
    }

    /// Returns the BDB as a slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.bdb
    }
}

/// A result from multi-BIR extraction, tagged with a filesystem-safe key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedResult {
    /// Unique key within the container, e.g. `Right_Thumb` or `FINGER_3`
    pub key: String,
    /// Subtype text as found in the document, if any
    pub subtype: Option<String>,
    /// 1-based position of the BIR among all collected BIRs
    pub ordinal: usize,
    /// The extracted record
    pub result: ExtractionResult,
}
