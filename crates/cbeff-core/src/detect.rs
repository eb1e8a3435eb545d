//! Container format detection.
//!
//! Detection is a prefix sniff, not validation: malformed input is rejected
//! later by the chosen extractor with a specific error.

use crate::encoding;
use crate::error::Result;
use bytes::Bytes;
use tracing::trace;

/// Raw caller-owned input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container<'a> {
    /// Text: CBEFF XML or base64-wrapped binary CBEFF
    Text(&'a str),
    /// Bytes: binary CBEFF, possibly base64-wrapped, or XML bytes
    Bytes(&'a [u8]),
}

impl<'a> Container<'a> {
    /// Views the container as text when it is valid UTF-8
    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            Container::Text(text) => Some(text),
            Container::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }

    /// Classifies file contents: valid UTF-8 is text, anything else bytes
    pub fn from_raw(data: &'a [u8]) -> Self {
        match std::str::from_utf8(data) {
            Ok(text) => Container::Text(text),
            Err(_) => Container::Bytes(data),
        }
    }

    /// Decodes a binary container to the bytes the heuristic ladder scans
    ///
    /// Text, and bytes that are valid UTF-8, are cleaned of everything outside
    /// the base64 alphabet and decoded. Other bytes are taken as an
    /// already-decoded container.
    pub(crate) fn binary_payload(&self) -> Result<Bytes> {
        match *self {
            Container::Bytes(bytes) if self.as_text().is_none() => {
                Ok(Bytes::copy_from_slice(bytes))
            }
            Container::Text(text) => Ok(Bytes::from(encoding::decode_container(text.as_bytes())?)),
            Container::Bytes(bytes) => Ok(Bytes::from(encoding::decode_container(bytes)?)),
        }
    }
}

impl<'a> From<&'a str> for Container<'a> {
    fn from(text: &'a str) -> Self {
        Container::Text(text)
    }
}

impl<'a> From<&'a [u8]> for Container<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Container::Bytes(bytes)
    }
}

/// Serialization a container was classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// CBEFF XML document
    Xml,
    /// Binary CBEFF, raw or base64-wrapped
    Binary,
}

/// Returns true if the text opens with an XML prolog or a `BIR` element
pub fn looks_like_xml(text: &str) -> bool {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    trimmed.starts_with("<?xml") || trimmed.starts_with("<BIR")
}

/// Classifies a container before any parsing is attempted
pub fn detect_format(container: &Container<'_>) -> ContainerFormat {
    let format = match container.as_text() {
        Some(text) if looks_like_xml(text) => ContainerFormat::Xml,
        _ => ContainerFormat::Binary,
    };
    trace!("Detected container format: {:?}", format);
    format
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_xml() {
        assert_eq!(
            detect_format(&Container::Text("  \n<?xml version=\"1.0\"?><BIR/>")),
            ContainerFormat::Xml
        );
        assert_eq!(
            detect_format(&Container::Text("<BIR xmlns=\"urn:x\"/>")),
            ContainerFormat::Xml
        );
        assert_eq!(
            detect_format(&Container::Bytes("\u{feff}<?xml version=\"1.0\"?>".as_bytes())),
            ContainerFormat::Xml
        );
    }

    #[test]
    fn test_detect_binary() {
        assert_eq!(
            detect_format(&Container::Text("Q0JFRkYBAAE=")),
            ContainerFormat::Binary
        );
        // other XML roots are not CBEFF XML
        assert_eq!(
            detect_format(&Container::Text("<Root/>")),
            ContainerFormat::Binary
        );
        assert_eq!(
            detect_format(&Container::Bytes(&[0xFF, 0xFE, 0x00, b'<'])),
            ContainerFormat::Binary
        );
    }

    #[test]
    fn test_binary_payload() {
        let payload = Container::Text("QUJD\nREVG").binary_payload().unwrap();
        assert_eq!(&payload[..], b"ABCDEF");

        let payload = Container::Bytes(b"QUJDREVG\r\n").binary_payload().unwrap();
        assert_eq!(&payload[..], b"ABCDEF");

        // a stray character does not turn text into raw binary
        let payload = Container::Bytes(b"QUJD*REVG.").binary_payload().unwrap();
        assert_eq!(&payload[..], b"ABCDEF");

        let raw = [0xFFu8, 0x01, b'F', b'M', b'R'];
        let payload = Container::Bytes(&raw).binary_payload().unwrap();
        assert_eq!(&payload[..], &raw);
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(Container::from_raw(b"QUJD"), Container::Text("QUJD"));
        assert_eq!(
            Container::from_raw(&[0xFF, 0x00]),
            Container::Bytes(&[0xFF, 0x00])
        );
    }
}
