//! Base64 handling for BDB text and textual binary containers.
//!
//! Two policies apply:
//! - BDB element text is decoded strictly: standard alphabet, canonical
//!   padding, no embedded whitespace.
//! - A base64-wrapped binary container is cleaned first (everything outside
//!   the alphabet is dropped) and its padding is repaired before decoding.

use crate::error::{Error, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

/// Strict decoder for BDB element text
const BDB_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical),
);

/// Decoder for cleaned container text (padding already repaired)
const CONTAINER_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Returns true for bytes of the standard base64 alphabet, padding included
#[inline]
fn is_base64_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
}

/// Decodes BDB element text with strict validation
pub(crate) fn decode_bdb(text: &str) -> Result<Vec<u8>> {
    BDB_ENGINE
        .decode(text.trim())
        .map_err(Error::InvalidBdbEncoding)
}

/// Encodes a record for transport
pub(crate) fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Drops every byte outside the base64 alphabet
pub(crate) fn clean(data: &[u8]) -> String {
    data.iter()
        .copied()
        .filter(|&b| is_base64_byte(b))
        .map(char::from)
        .collect()
}

/// Re-pads cleaned base64 text to a multiple of four characters
pub(crate) fn repair_padding(cleaned: &str) -> String {
    let unpadded = cleaned.trim_end_matches('=');
    let missing = (4 - unpadded.len() % 4) % 4;
    let mut repaired = String::with_capacity(unpadded.len() + missing);
    repaired.push_str(unpadded);
    repaired.extend(std::iter::repeat('=').take(missing));
    repaired
}

/// Cleans, re-pads and decodes a base64-wrapped binary container
pub(crate) fn decode_container(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned = clean(data);
    if cleaned.trim_end_matches('=').is_empty() {
        return Err(Error::EmptyContainer);
    }
    let repaired = repair_padding(&cleaned);
    CONTAINER_ENGINE
        .decode(repaired)
        .map_err(Error::InvalidContainerEncoding)
}
