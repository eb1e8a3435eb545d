//! Biometric modalities and their ISO 19794 sub-standard versions.
//!
//! The version is never read from a container: it is a fixed function of
//! the modality (part 4 for finger, part 6 for iris, part 5 for face).

use crate::error::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Sensed biometric modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    /// Fingerprint (ISO 19794-4)
    Finger,
    /// Iris image (ISO 19794-6)
    Iris,
    /// Face image (ISO 19794-5)
    Face,
}

impl Modality {
    /// All modalities in detection priority order
    pub const ALL: [Modality; 3] = [Modality::Finger, Modality::Iris, Modality::Face];

    /// Upper-case wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Finger => "FINGER",
            Modality::Iris => "IRIS",
            Modality::Face => "FACE",
        }
    }

    /// The ISO 19794 version every record of this modality is rendered with
    pub fn iso_version(self) -> IsoVersion {
        match self {
            Modality::Finger => IsoVersion::Finger2011,
            Modality::Iris => IsoVersion::Iris2011,
            Modality::Face => IsoVersion::Face2011,
        }
    }

    /// Upper-case substrings that identify this modality in free text
    pub(crate) fn keywords(self) -> [&'static str; 2] {
        match self {
            Modality::Finger => ["FINGER", "FMR"],
            Modality::Iris => ["IRIS", "IRI"],
            Modality::Face => ["FACE", "FAC"],
        }
    }

    /// Three-byte record identifier opening an ISO 19794 record
    pub(crate) fn magic(self) -> &'static [u8] {
        match self {
            Modality::Finger => b"FMR",
            Modality::Iris => b"IRI",
            Modality::Face => b"FAC",
        }
    }

    /// Standard name that may appear in a binary header
    pub(crate) fn standard_label(self) -> &'static [u8] {
        match self {
            Modality::Finger => b"ISO19794-4",
            Modality::Iris => b"ISO19794-6",
            Modality::Face => b"ISO19794-5",
        }
    }

    /// Classifies a free-text label such as a CBEFF `Type` value
    ///
    /// Matching is case-insensitive substring containment, tried in
    /// finger, iris, face order.
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        if upper.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|m| m.keywords().iter().any(|k| upper.contains(k)))
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FINGER" => Ok(Modality::Finger),
            "IRIS" => Ok(Modality::Iris),
            "FACE" => Ok(Modality::Face),
            _ => Err(Error::InvalidModality(s.to_string())),
        }
    }
}

/// ISO 19794 sub-standard version identifier understood by the renderer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IsoVersion {
    /// `ISO19794_4_2011`
    Finger2011,
    /// `ISO19794_6_2011`
    Iris2011,
    /// `ISO19794_5_2011`
    Face2011,
    /// Any other identifier supplied by the caller
    Other(String),
}

impl IsoVersion {
    /// Identifier as sent to the renderer
    pub fn as_str(&self) -> &str {
        match self {
            IsoVersion::Finger2011 => "ISO19794_4_2011",
            IsoVersion::Iris2011 => "ISO19794_6_2011",
            IsoVersion::Face2011 => "ISO19794_5_2011",
            IsoVersion::Other(name) => name,
        }
    }
}

impl fmt::Display for IsoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsoVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let version = match s.trim() {
            "ISO19794_4_2011" => IsoVersion::Finger2011,
            "ISO19794_6_2011" => IsoVersion::Iris2011,
            "ISO19794_5_2011" => IsoVersion::Face2011,
            other => IsoVersion::Other(other.to_string()),
        };
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_label_keywords() {
        assert_eq!(Modality::from_label("Finger"), Some(Modality::Finger));
        assert_eq!(
            Modality::from_label("Finger Minutiae Record"),
            Some(Modality::Finger)
        );
        assert_eq!(Modality::from_label("fmr"), Some(Modality::Finger));
        assert_eq!(Modality::from_label("Iris Image"), Some(Modality::Iris));
        assert_eq!(Modality::from_label("Facial Image"), Some(Modality::Face));
        assert_eq!(Modality::from_label("  face  "), Some(Modality::Face));
    }

    #[test]
    fn test_from_label_unknown() {
        assert_eq!(Modality::from_label("Voice"), None);
        assert_eq!(Modality::from_label(""), None);
        assert_eq!(Modality::from_label("   "), None);
    }

    #[test]
    fn test_version_mapping_is_total() {
        assert_eq!(Modality::Finger.iso_version().as_str(), "ISO19794_4_2011");
        assert_eq!(Modality::Iris.iso_version().as_str(), "ISO19794_6_2011");
        assert_eq!(Modality::Face.iso_version().as_str(), "ISO19794_5_2011");

        let mut versions: Vec<_> = Modality::ALL.iter().map(|m| m.iso_version()).collect();
        versions.dedup();
        assert_eq!(versions.len(), 3);
    }

    #[test]
    fn test_modality_from_str() {
        assert_eq!("finger".parse::<Modality>().unwrap(), Modality::Finger);
        assert_eq!("IRIS".parse::<Modality>().unwrap(), Modality::Iris);
        assert!("palm".parse::<Modality>().is_err());
    }

    #[test]
    fn test_iso_version_round_trip() {
        let parsed: IsoVersion = "ISO19794_5_2011".parse().unwrap();
        assert_eq!(parsed, IsoVersion::Face2011);

        let custom: IsoVersion = "ISO19794_4_2005".parse().unwrap();
        assert_eq!(custom.as_str(), "ISO19794_4_2005");
    }
}
