//! CBEFF XML extraction.
//!
//! A CBEFF XML document holds one or more `BIR` elements, each carrying a
//! `BDBInfo` block (modality in `Type`, optional `Subtype`) and a `BDB`
//! element with the base64 ISO 19794 record. Element lookups go through
//! [`lookup::Lookup`] so qualified, prefixed and unqualified documents all
//! resolve the same way.

mod lookup;

use crate::encoding;
use crate::error::{Error, Result};
use crate::modality::Modality;
use crate::record::{ExtractionResult, KeyedResult};
use lookup::{Lookup, Scope};
use roxmltree::{Document, Node};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

const BIR: &str = "BIR";
const BDB_INFO: &str = "BDBInfo";
const BDB: &str = "BDB";
const TYPE: &str = "Type";
const SUBTYPE: &str = "Subtype";

/// A parsed document with its collected BIR elements
struct BirSet<'a, 'input> {
    lookup: Lookup,
    birs: Vec<Node<'a, 'input>>,
}

impl<'a, 'input: 'a> BirSet<'a, 'input> {
    /// Collects every BIR in the document.
    ///
    /// A root `BIR` is prepended unless `root_only_if_alone` is set and the
    /// root wraps nested BIRs; multi-record extraction uses that to avoid
    /// reporting the wrapper's first child twice.
    fn collect(doc: &'a Document<'input>, root_only_if_alone: bool) -> Result<Self> {
        let root = doc.root_element();
        let lookup = Lookup::for_root(root);
        let mut birs = lookup.find_all(root, BIR, Scope::Descendants);

        let root_is_bir = root.tag_name().name() == BIR;
        if root_is_bir && !birs.contains(&root) && !(root_only_if_alone && !birs.is_empty()) {
            birs.insert(0, root);
        }

        debug!("Collected {} BIR element(s)", birs.len());

        if birs.is_empty() {
            return Err(Error::NoBirFound);
        }
        Ok(Self { lookup, birs })
    }

    /// First BIR with both a `BDBInfo` and a `BDB`, else the first BIR
    fn preferred(&self) -> Node<'a, 'input> {
        self.birs
            .iter()
            .copied()
            .find(|bir| {
                self.lookup.find(*bir, BDB_INFO, Scope::Descendants).is_some()
                    && self.lookup.find(*bir, BDB, Scope::Descendants).is_some()
            })
            .unwrap_or(self.birs[0])
    }

    fn modality(&self, bir: Node<'a, 'input>) -> Result<Modality> {
        let info = self
            .lookup
            .find(bir, BDB_INFO, Scope::Descendants)
            .ok_or_else(|| Error::modality_undetected("BIR has no BDBInfo element"))?;
        let type_text = self
            .lookup
            .find_child_or_descendant(info, TYPE)
            .and_then(|node| node.text())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::modality_undetected("BDBInfo has no Type value"))?;

        Modality::from_label(type_text).ok_or_else(|| {
            Error::modality_undetected(format!("unrecognised BDBInfo Type '{}'", type_text))
        })
    }

    fn subtype(&self, bir: Node<'a, 'input>) -> Option<String> {
        let info = self.lookup.find(bir, BDB_INFO, Scope::Descendants)?;
        let text = self
            .lookup
            .find_child_or_descendant(info, SUBTYPE)?
            .text()?
            .trim();
        if text.is_empty() || text.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(text.to_string())
        }
    }

    fn bdb(&self, bir: Node<'a, 'input>) -> Result<Vec<u8>> {
        let text = self
            .lookup
            .find(bir, BDB, Scope::Descendants)
            .ok_or_else(|| Error::missing_bdb("no BDB element"))?
            .text()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::missing_bdb("BDB element is empty"))?;

        let bytes = encoding::decode_bdb(text)?;
        if bytes.is_empty() {
            return Err(Error::missing_bdb("BDB contains no data"));
        }
        Ok(bytes)
    }
}

/// Extracts the preferred record from a CBEFF XML document
///
/// A `modality_override` stands in for an undetectable `Type`; a detected
/// modality is replaced by it as well.
pub fn extract_first(xml: &str, modality_override: Option<Modality>) -> Result<ExtractionResult> {
    let doc = Document::parse(xml)?;
    let set = BirSet::collect(&doc, false)?;
    let bir = set.preferred();
    trace!("Selected BIR element {:?}", bir.id());

    let modality = match (set.modality(bir), modality_override) {
        (_, Some(modality)) => modality,
        (Ok(modality), None) => modality,
        (Err(e), None) => return Err(e),
    };
    let bdb = set.bdb(bir)?;

    debug!("Extracted {} BDB bytes ({})", bdb.len(), modality);
    Ok(ExtractionResult::new(bdb, modality))
}

/// Extracts every usable record from a CBEFF XML document
///
/// Records failing per-BIR validation are skipped. Fails with
/// [`Error::NoUsableBir`] only if every BIR was skipped.
pub fn extract_all(xml: &str) -> Result<Vec<KeyedResult>> {
    let doc = Document::parse(xml)?;
    let set = BirSet::collect(&doc, true)?;

    let mut results = Vec::new();
    let mut keys = HashSet::new();

    for (index, bir) in set.birs.iter().copied().enumerate() {
        let ordinal = index + 1;
        let record = set
            .modality(bir)
            .and_then(|modality| set.bdb(bir).map(|bdb| (modality, bdb)));

        let (modality, bdb) = match record {
            Ok(record) => record,
            Err(e) if e.is_record_level() => {
                warn!("Skipping BIR {}: {}", ordinal, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let subtype = set.subtype(bir);
        let key = unique_key(&mut keys, subtype.as_deref(), modality, ordinal);
        debug!("BIR {} -> {} ({} bytes)", ordinal, key, bdb.len());

        results.push(KeyedResult {
            key,
            subtype,
            ordinal,
            result: ExtractionResult::new(bdb, modality),
        });
    }

    if results.is_empty() {
        return Err(Error::NoUsableBir {
            candidates: set.birs.len(),
        });
    }
    Ok(results)
}

/// Folds a subtype label into a filesystem-safe key
///
/// Characters other than alphanumerics, `_`, `-` and whitespace are dropped;
/// runs of `-`/whitespace become one `_`; edge underscores are trimmed.
pub fn sanitize_subtype(subtype: &str) -> String {
    let mut key = String::with_capacity(subtype.len());
    let mut separator = false;

    for c in subtype.chars() {
        if c == '-' || c.is_whitespace() {
            separator = true;
        } else if c.is_alphanumeric() || c == '_' {
            if separator {
                key.push('_');
                separator = false;
            }
            key.push(c);
        }
    }

    key.trim_matches('_').to_string()
}

/// Picks the output key for a record, keeping keys unique within a container
fn unique_key(
    taken: &mut HashSet<String>,
    subtype: Option<&str>,
    modality: Modality,
    ordinal: usize,
) -> String {
    let fallback = format!("{}_{}", modality, ordinal);
    let preferred = subtype
        .map(sanitize_subtype)
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| fallback.clone());

    let mut key = if taken.contains(&preferred) {
        trace!("Key '{}' already used, falling back to '{}'", preferred, fallback);
        fallback
    } else {
        preferred
    };

    let base = key.clone();
    let mut suffix = 2;
    while taken.contains(&key) {
        key = format!("{}_{}", base, suffix);
        suffix += 1;
    }

    taken.insert(key.clone());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NS: &str = "http://standards.iso.org/iso-iec/19785/-3/ed-2/";

    fn bir(ty: &str, subtype: Option<&str>, bdb: &str) -> String {
        let subtype = subtype
            .map(|s| format!("<Subtype>{}</Subtype>", s))
            .unwrap_or_default();
        format!(
            "<BIR><BDBInfo><Type>{}</Type>{}</BDBInfo><BDB>{}</BDB></BIR>",
            ty, subtype, bdb
        )
    }

    #[test]
    fn test_single_root_bir() {
        let xml = format!("<?xml version=\"1.0\"?>{}", bir("Finger", None, "Rk1SAA=="));
        let result = extract_first(&xml, None).unwrap();
        assert_eq!(result.as_bytes(), b"FMR\0");
        assert_eq!(result.modality, Modality::Finger);
        assert_eq!(result.iso_version.as_str(), "ISO19794_4_2011");
    }

    #[test]
    fn test_namespaced_document() {
        let xml = format!(
            r#"<BIR xmlns="{ns}"><BIRInfo/><BIR><BDBInfo><Type>Iris</Type></BDBInfo><BDB>SVJJAA==</BDB></BIR></BIR>"#,
            ns = NS
        );
        let result = extract_first(&xml, None).unwrap();
        assert_eq!(result.modality, Modality::Iris);
        assert_eq!(result.as_bytes(), b"IRI\0");
    }

    #[test]
    fn test_prefers_complete_bir() {
        let xml = format!(
            "<Wrapper><BIR><BDBInfo><Type>Face</Type></BDBInfo></BIR>{}</Wrapper>",
            bir("Facial Image", None, "RkFDAA==")
        );
        let result = extract_first(&xml, None).unwrap();
        assert_eq!(result.modality, Modality::Face);
        assert_eq!(result.as_bytes(), b"FAC\0");
    }

    #[test]
    fn test_falls_back_to_first_incomplete_bir() {
        let xml = "<BIR><BDBInfo><Type>Finger</Type></BDBInfo></BIR>";
        let err = extract_first(xml, None).unwrap_err();
        assert!(matches!(err, Error::MissingOrEmptyBdb { .. }));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            extract_first("<BIR><unclosed></BIR>", None),
            Err(Error::MalformedXml(_))
        ));
        assert!(matches!(
            extract_first("<Root><Other/></Root>", None),
            Err(Error::NoBirFound)
        ));
        assert!(matches!(
            extract_first(&bir("Voice", None, "AAAA"), None),
            Err(Error::ModalityUndetected { .. })
        ));
        assert!(matches!(
            extract_first(&bir("Finger", None, "   "), None),
            Err(Error::MissingOrEmptyBdb { .. })
        ));
        assert!(matches!(
            extract_first(&bir("Finger", None, "not*base64"), None),
            Err(Error::InvalidBdbEncoding(_))
        ));
    }

    #[test]
    fn test_modality_override() {
        let result = extract_first(&bir("Voice", None, "AAAA"), Some(Modality::Face)).unwrap();
        assert_eq!(result.modality, Modality::Face);
        assert_eq!(result.iso_version.as_str(), "ISO19794_5_2011");
    }

    #[test]
    fn test_extract_all_skips_unusable() {
        let xml = format!(
            "<BIR>{}{}{}{}</BIR>",
            bir("Finger", Some("Right Thumb (Minor)"), "AQID"),
            bir("Finger", Some("Left Thumb"), "***"),
            bir("Finger", Some("None"), "BAUG"),
            "<BIR><BDB>AQID</BDB></BIR>",
        );
        let results = extract_all(&xml).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].key, "Right_Thumb_Minor");
        assert_eq!(results[0].ordinal, 1);
        assert_eq!(results[0].result.as_bytes(), &[1, 2, 3]);

        assert_eq!(results[1].key, "FINGER_3");
        assert_eq!(results[1].subtype, None);
        assert_eq!(results[1].result.as_bytes(), &[4, 5, 6]);
    }

    #[test]
    fn test_extract_all_single_root_bir() {
        let results = extract_all(&bir("Iris", Some("Left"), "AQID")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "Left");
        assert_eq!(results[0].result.modality, Modality::Iris);
    }

    #[test]
    fn test_extract_all_none_usable() {
        let xml = format!("<BIR>{}{}</BIR>", bir("Voice", None, "AQID"), bir("Finger", None, ""));
        assert!(matches!(
            extract_all(&xml),
            Err(Error::NoUsableBir { candidates: 2 })
        ));
    }

    #[test]
    fn test_extract_all_duplicate_subtypes() {
        let xml = format!(
            "<BIR>{}{}</BIR>",
            bir("Finger", Some("Right Index"), "AQID"),
            bir("Finger", Some("Right-Index"), "BAUG"),
        );
        let results = extract_all(&xml).unwrap();
        assert_eq!(results[0].key, "Right_Index");
        assert_eq!(results[1].key, "FINGER_2");
    }

    #[test]
    fn test_sanitize_subtype() {
        assert_eq!(sanitize_subtype("Right Thumb (Minor)"), "Right_Thumb_Minor");
        assert_eq!(sanitize_subtype("  Left -- Index  "), "Left_Index");
        assert_eq!(sanitize_subtype("a_ b"), "a__b");
        assert_eq!(sanitize_subtype("../../etc"), "etc");
        assert_eq!(sanitize_subtype("()"), "");
    }

    #[test]
    fn test_unique_key_collision_chain() {
        let mut taken = HashSet::new();
        taken.insert("FINGER_2".to_string());
        taken.insert("Thumb".to_string());
        let key = unique_key(&mut taken, Some("Thumb"), Modality::Finger, 2);
        assert_eq!(key, "FINGER_2_2");
    }
}
