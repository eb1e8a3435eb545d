//! Binary CBEFF extraction.
//!
//! Binary CBEFF has no single layout in the wild, so the BDB is located by a
//! ladder of heuristics ordered from structured to best-effort:
//!
//! 1. Structured scan: `[8-byte header][u32 BE SBH len][SBH][u32 BE BDB len][BDB]`,
//!    modality read from the SBH text.
//! 2. Signature scan: slide a window over the buffer; the first window holding
//!    an ISO 19794 label (`ISO19794-4`) or record identifier (`FMR`) and
//!    starting with a plausible big-endian length yields the record.
//! 3. Whole buffer: a record identifier within the first window means the
//!    buffer is a bare ISO record.
//!
//! Each rung either locates a record or reports why it missed; only when all of
//! them miss does extraction fail, with [`Error::ModalityUndetected`].

use crate::error::{Error, Result};
use crate::modality::Modality;
use crate::record::ExtractionResult;
use aho_corasick::AhoCorasick;
use bytes::Bytes;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Decoded containers shorter than this are rejected outright
pub const MIN_CONTAINER_LEN: usize = 8;

/// Default width of the signature scan window
pub const DEFAULT_SIGNATURE_WINDOW: usize = 100;

/// Fixed header preceding the SBH length field
const HEADER_LEN: usize = 8;

/// Width of every length field
const LENGTH_FIELD_LEN: usize = 4;

/// Signature patterns, grouped by modality in detection order
static SIGNATURE_PATTERNS: LazyLock<Vec<(&'static [u8], Modality)>> = LazyLock::new(|| {
    Modality::ALL
        .into_iter()
        .flat_map(|m| [(m.standard_label(), m), (m.magic(), m)])
        .collect()
});

static SIGNATURE_MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new(SIGNATURE_PATTERNS.iter().map(|(pattern, _)| pattern))
        .expect("signature patterns are valid literals")
});

/// Which heuristic located the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rung {
    /// Length-prefixed SBH/BDB layout
    Structured,
    /// Signature window with a leading length field
    Signature,
    /// Whole buffer treated as a bare ISO record
    WholeBuffer,
    /// Whole buffer used because the caller supplied the modality
    CallerModality,
}

/// Why a rung did not produce a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Miss {
    /// Buffer too small for the rung's layout
    TooShort,
    /// SBH length is zero or exceeds the buffer
    SbhOutOfBounds(usize),
    /// No room for a BDB length field after the SBH
    NoBdbLength,
    /// BDB length exceeds the buffer
    BdbOutOfBounds(usize),
    /// No window held a signature with a plausible length
    NoSignature,
    /// No record identifier near the start of the buffer
    NoMagic,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::TooShort => write!(f, "buffer too short"),
            Miss::SbhOutOfBounds(len) => write!(f, "SBH length {} out of bounds", len),
            Miss::NoBdbLength => write!(f, "no BDB length field after SBH"),
            Miss::BdbOutOfBounds(len) => write!(f, "BDB length {} out of bounds", len),
            Miss::NoSignature => write!(f, "no signature with valid length"),
            Miss::NoMagic => write!(f, "no record identifier in leading window"),
        }
    }
}

/// A record located by one rung
#[derive(Debug, Clone)]
struct Located {
    bdb: Bytes,
    modality: Option<Modality>,
    rung: Rung,
}

type Step = std::result::Result<Located, Miss>;

/// Reads a big-endian u32 length field
#[inline]
fn read_length(data: &[u8], offset: usize) -> Option<usize> {
    let field = data.get(offset..offset.checked_add(LENGTH_FIELD_LEN)?)?;
    let value = u32::from_be_bytes([field[0], field[1], field[2], field[3]]);
    usize::try_from(value).ok()
}

/// Find a subsequence within a byte slice
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Rung 1: length-prefixed SBH followed by a length-prefixed BDB
fn structured_scan(data: &Bytes) -> Step {
    let sbh_start = HEADER_LEN + LENGTH_FIELD_LEN;
    let sbh_len = read_length(data, HEADER_LEN).ok_or(Miss::TooShort)?;
    let sbh_end = sbh_start
        .checked_add(sbh_len)
        .filter(|&end| sbh_len > 0 && end <= data.len())
        .ok_or(Miss::SbhOutOfBounds(sbh_len))?;

    let sbh = String::from_utf8_lossy(&data[sbh_start..sbh_end]);
    let modality = Modality::from_label(&sbh);
    trace!("SBH {}..{} suggests {:?}", sbh_start, sbh_end, modality);

    let bdb_len = read_length(data, sbh_end).ok_or(Miss::NoBdbLength)?;
    let bdb_start = sbh_end + LENGTH_FIELD_LEN;
    let bdb_end = bdb_start
        .checked_add(bdb_len)
        .filter(|&end| end <= data.len())
        .ok_or(Miss::BdbOutOfBounds(bdb_len))?;

    Ok(Located {
        bdb: data.slice(bdb_start..bdb_end),
        modality,
        rung: Rung::Structured,
    })
}

/// Signature occurrences for one modality, sorted by start offset
struct Occurrences {
    modality: Modality,
    spans: Vec<(usize, usize)>,
}

impl Occurrences {
    fn collect(data: &[u8]) -> Vec<Self> {
        let mut all: Vec<Self> = Modality::ALL
            .into_iter()
            .map(|modality| Self {
                modality,
                spans: Vec::new(),
            })
            .collect();

        for m in SIGNATURE_MATCHER.find_overlapping_iter(data) {
            let modality = SIGNATURE_PATTERNS[m.pattern().as_usize()].1;
            if let Some(entry) = all.iter_mut().find(|o| o.modality == modality) {
                entry.spans.push((m.start(), m.end()));
            }
        }
        for entry in &mut all {
            entry.spans.sort_unstable();
        }
        all
    }

    /// Does any occurrence lie entirely within `start..end`?
    fn within(&self, start: usize, end: usize) -> bool {
        let first = self.spans.partition_point(|&(s, _)| s < start);
        self.spans[first..]
            .iter()
            .take_while(|&&(s, _)| s < end)
            .any(|&(_, e)| e <= end)
    }
}

/// Rung 2: first window holding a signature whose start carries a valid length
fn signature_scan(data: &Bytes, window: usize) -> Step {
    if data.len() <= window || window < LENGTH_FIELD_LEN {
        return Err(Miss::NoSignature);
    }

    let occurrences = Occurrences::collect(data);
    if occurrences.iter().all(|o| o.spans.is_empty()) {
        return Err(Miss::NoSignature);
    }

    for start in 0..data.len() - window {
        // the first modality present in the window decides; a bad length
        // moves on to the next offset
        let Some(found) = occurrences.iter().find(|o| o.within(start, start + window)) else {
            continue;
        };

        let Some(record_len) = read_length(data, start) else {
            continue;
        };
        if record_len > 0 && record_len < data.len() - start {
            trace!(
                "Signature window at {} yields {} byte {} record",
                start,
                record_len,
                found.modality
            );
            return Ok(Located {
                bdb: data.slice(start..start + record_len),
                modality: Some(found.modality),
                rung: Rung::Signature,
            });
        }
    }

    Err(Miss::NoSignature)
}

/// Rung 3: record identifier near the start marks a bare ISO record
fn whole_buffer(data: &Bytes, window: usize) -> Step {
    let head = &data[..data.len().min(window)];
    Modality::ALL
        .into_iter()
        .find(|m| find_subsequence(head, m.magic()).is_some())
        .map(|modality| Located {
            bdb: data.clone(),
            modality: Some(modality),
            rung: Rung::WholeBuffer,
        })
        .ok_or(Miss::NoMagic)
}

/// Runs the ladder over a decoded container
///
/// With a `modality_override` the located modality is replaced, and if no
/// rung succeeds the whole buffer is taken as the record.
pub fn extract(
    data: Bytes,
    window: usize,
    modality_override: Option<Modality>,
) -> Result<ExtractionResult> {
    if data.len() < MIN_CONTAINER_LEN {
        return Err(Error::container_too_short(data.len(), MIN_CONTAINER_LEN));
    }

    let rungs: [(&str, &dyn Fn() -> Step); 3] = [
        ("structured", &|| structured_scan(&data)),
        ("signature", &|| signature_scan(&data, window)),
        ("whole-buffer", &|| whole_buffer(&data, window)),
    ];

    let mut located = None;
    for (name, rung) in rungs {
        match rung() {
            Ok(found) => {
                located = Some(found);
                break;
            }
            Err(miss) => trace!("{} rung missed: {}", name, miss),
        }
    }

    let located = match (located, modality_override) {
        (Some(found), _) => found,
        (None, Some(modality)) => Located {
            bdb: data.clone(),
            modality: Some(modality),
            rung: Rung::CallerModality,
        },
        (None, None) => {
            return Err(Error::modality_undetected(
                "no SBH, ISO 19794 signature or record identifier in binary CBEFF",
            ))
        }
    };

    let modality = modality_override
        .or(located.modality)
        .ok_or_else(|| Error::modality_undetected("SBH carries no modality keyword"))?;

    if located.bdb.is_empty() {
        return Err(Error::missing_bdb("located BDB region is empty"));
    }

    debug!(
        "{:?} rung located {} BDB bytes ({})",
        located.rung,
        located.bdb.len(),
        modality
    );
    Ok(ExtractionResult::new(located.bdb, modality))
}
