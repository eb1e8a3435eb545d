//! Error types for the cbeff-core library.
//!
//! Every extraction failure is a named variant; no heuristic failure escapes
//! as a generic error. Multi-BIR extraction uses [`Error::is_record_level`]
//! to decide which failures only disqualify a single record.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all CBEFF extraction operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The XML parser could not build a document tree
    #[error("malformed CBEFF XML: {0}")]
    MalformedXml(#[from] roxmltree::Error),

    /// No BIR element (or binary record) was found in the container
    #[error("no BIR elements found in CBEFF container")]
    NoBirFound,

    /// Every heuristic failed to resolve the sensed modality
    #[error("could not detect modality: {details}")]
    ModalityUndetected {
        /// Where detection was attempted
        details: String,
    },

    /// The BDB element or region is absent or carries no data
    #[error("missing or empty BDB: {details}")]
    MissingOrEmptyBdb {
        /// What was missing
        details: String,
    },

    /// The BDB text is not strict standard base64
    #[error("failed to decode BDB base64 data: {0}")]
    InvalidBdbEncoding(#[source] base64::DecodeError),

    /// The decoded binary container is below the minimum viable length
    #[error("CBEFF container too short: {len} bytes (minimum {min})")]
    ContainerTooShort {
        /// Decoded length
        len: usize,
        /// Minimum accepted length
        min: usize,
    },

    /// Multi-BIR extraction found records but none survived validation
    #[error("none of the {candidates} BIR elements carried a usable BDB")]
    NoUsableBir {
        /// Number of BIR elements that were inspected
        candidates: usize,
    },

    /// The textual container had no base64 characters left after cleanup
    #[error("CBEFF container is empty or contains no valid base64 characters")]
    EmptyContainer,

    /// The cleaned container text could not be base64-decoded
    #[error("invalid base64 encoding in CBEFF container: {0}")]
    InvalidContainerEncoding(#[source] base64::DecodeError),

    /// A modality name supplied by the caller is not FINGER, IRIS or FACE
    #[error("unsupported modality '{0}': expected FINGER, IRIS or FACE")]
    InvalidModality(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new modality detection error
    pub fn modality_undetected(details: impl Into<String>) -> Self {
        Self::ModalityUndetected {
            details: details.into(),
        }
    }

    /// Creates a new missing/empty BDB error
    pub fn missing_bdb(details: impl Into<String>) -> Self {
        Self::MissingOrEmptyBdb {
            details: details.into(),
        }
    }

    /// Creates a new container length error
    pub fn container_too_short(len: usize, min: usize) -> Self {
        Self::ContainerTooShort { len, min }
    }

    /// Returns true if this failure only disqualifies a single BIR
    ///
    /// Multi-BIR extraction skips records failing with these and carries on
    /// with their siblings.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::ModalityUndetected { .. }
                | Self::MissingOrEmptyBdb { .. }
                | Self::InvalidBdbEncoding(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::container_too_short(5, 8);
        assert!(err.to_string().contains("too short"));
        assert!(err.to_string().contains("5 bytes"));

        let err = Error::file_read("/tmp/cbeff.xml", std::io::ErrorKind::NotFound.into());
        assert!(err.to_string().contains("/tmp/cbeff.xml"));
    }

    #[test]
    fn test_is_record_level() {
        assert!(Error::missing_bdb("no BDB element").is_record_level());
        assert!(Error::modality_undetected("BDBInfo/Type").is_record_level());
        assert!(!Error::NoBirFound.is_record_level());
        assert!(!Error::container_too_short(0, 8).is_record_level());
    }
}
