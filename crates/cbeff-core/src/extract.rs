//! Extraction entry points.
//!
//! [`Extractor`] routes a container through format detection to the XML or
//! binary extractor and applies caller overrides. Calls hold no state; the
//! same input always yields the same result.

use crate::binary::{self, DEFAULT_SIGNATURE_WINDOW};
use crate::detect::{detect_format, Container, ContainerFormat};
use crate::error::{Error, Result};
use crate::modality::{IsoVersion, Modality};
use crate::record::{ExtractionResult, KeyedResult};
use crate::xml;
use tracing::debug;

/// How many records to take from an XML container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BirSelection {
    /// The first complete BIR; any failure is returned to the caller
    #[default]
    First,
    /// Every usable BIR; per-record failures skip that record
    All,
}

/// Configuration for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Record selection for XML containers
    pub selection: BirSelection,
    /// Modality to use instead of the detected one
    pub modality_override: Option<Modality>,
    /// Version to use instead of the one derived from the modality
    pub iso_version_override: Option<IsoVersion>,
    /// Width of the binary signature scan window
    pub signature_window: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            selection: BirSelection::First,
            modality_override: None,
            iso_version_override: None,
            signature_window: DEFAULT_SIGNATURE_WINDOW,
        }
    }
}

impl ExtractorConfig {
    /// Creates a new extractor config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the XML record selection
    pub fn selection(mut self, selection: BirSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Overrides the detected modality
    pub fn modality_override(mut self, modality: Option<Modality>) -> Self {
        self.modality_override = modality;
        self
    }

    /// Overrides the derived ISO version
    pub fn iso_version_override(mut self, version: Option<IsoVersion>) -> Self {
        self.iso_version_override = version;
        self
    }

    /// Sets the binary signature scan window width
    pub fn signature_window(mut self, width: usize) -> Self {
        self.signature_window = width;
        self
    }
}

/// Extracts biometric records from CBEFF containers
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    /// Creates a new extractor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new extractor with custom configuration
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn finish(&self, result: ExtractionResult) -> ExtractionResult {
        match &self.config.iso_version_override {
            Some(version) => result.with_iso_version(version.clone()),
            None => result,
        }
    }

    /// Extracts a single record, propagating the first failure
    pub fn extract(&self, container: &Container<'_>) -> Result<ExtractionResult> {
        let modality = self.config.modality_override;
        let result = match (detect_format(container), container.as_text()) {
            (ContainerFormat::Xml, Some(text)) => xml::extract_first(text, modality)?,
            _ => {
                let payload = container.binary_payload()?;
                debug!("Decoded binary container: {} bytes", payload.len());
                binary::extract(payload, self.config.signature_window, modality)?
            }
        };
        Ok(self.finish(result))
    }

    /// Detects the container format and extracts according to the configured selection
    ///
    /// Binary containers always yield one record. XML containers yield one
    /// record under [`BirSelection::First`] and every usable record under
    /// [`BirSelection::All`].
    pub fn detect_and_extract(&self, container: &Container<'_>) -> Result<Vec<ExtractionResult>> {
        let format = detect_format(container);
        match (self.config.selection, format, container.as_text()) {
            (BirSelection::All, ContainerFormat::Xml, Some(text)) => Ok(self
                .extract_all(text)?
                .into_iter()
                .map(|keyed| keyed.result)
                .collect()),
            _ => self.extract(container).map(|result| vec![result]),
        }
    }

    /// Extracts every usable record of an XML container, keyed for output
    ///
    /// Overrides do not apply: each BIR carries its own modality.
    pub fn extract_all(&self, xml_text: &str) -> Result<Vec<KeyedResult>> {
        let results = xml::extract_all(xml_text)?;
        debug!("Extracted {} record(s) from XML container", results.len());
        Ok(results)
    }

    /// Reads a file and extracts according to the configured selection
    pub fn extract_file(&self, path: impl AsRef<std::path::Path>) -> Result<Vec<ExtractionResult>> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        self.detect_and_extract(&Container::from_raw(&data))
    }
}

/// Detects the container format and extracts one record with default configuration
pub fn detect_and_extract(container: &Container<'_>) -> Result<Vec<ExtractionResult>> {
    Extractor::new().detect_and_extract(container)
}

/// Extracts every usable record of an XML container
pub fn extract_all(xml_text: &str) -> Result<Vec<KeyedResult>> {
    Extractor::new().extract_all(xml_text)
}

/// Reads a file and extracts with custom configuration
pub fn extract_file(
    path: impl AsRef<std::path::Path>,
    config: ExtractorConfig,
) -> Result<Vec<ExtractionResult>> {
    Extractor::with_config(config).extract_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FINGER_XML: &str =
        "<BIR><BDBInfo><Type>Finger</Type></BDBInfo><BDB>Rk1SAA==</BDB></BIR>";

    #[test]
    fn test_extractor_config_builder() {
        let config = ExtractorConfig::new()
            .selection(BirSelection::All)
            .modality_override(Some(Modality::Iris))
            .iso_version_override(Some(IsoVersion::Other("ISO19794_6_2005".into())))
            .signature_window(64);

        assert_eq!(config.selection, BirSelection::All);
        assert_eq!(config.modality_override, Some(Modality::Iris));
        assert_eq!(config.signature_window, 64);
    }

    #[test]
    fn test_extract_xml_text() {
        let result = Extractor::new()
            .extract(&Container::Text(FINGER_XML))
            .unwrap();
        assert_eq!(result.modality, Modality::Finger);
        assert_eq!(result.as_bytes(), b"FMR\0");
    }

    #[test]
    fn test_iso_version_override() {
        let config = ExtractorConfig::new()
            .iso_version_override(Some(IsoVersion::Other("ISO19794_4_2005".into())));
        let result = Extractor::with_config(config)
            .extract(&Container::Text(FINGER_XML))
            .unwrap();
        assert_eq!(result.modality, Modality::Finger);
        assert_eq!(result.iso_version.as_str(), "ISO19794_4_2005");
    }

    #[test]
    fn test_detect_and_extract_all_selection() {
        let xml = format!("<BIR>{}{}</BIR>", FINGER_XML, FINGER_XML);
        let container = Container::Text(&xml);

        let first = detect_and_extract(&container).unwrap();
        assert_eq!(first.len(), 1);

        let all = Extractor::with_config(ExtractorConfig::new().selection(BirSelection::All))
            .detect_and_extract(&container)
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_binary_short_container() {
        // "AAAA" decodes to 3 bytes
        let err = detect_and_extract(&Container::Text("AAAA")).unwrap_err();
        assert!(matches!(err, Error::ContainerTooShort { len: 3, .. }));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let container = Container::Text(FINGER_XML);
        let a = detect_and_extract(&container).unwrap();
        let b = detect_and_extract(&container).unwrap();
        assert_eq!(a, b);
    }
}
