//! Hashing and text encoding helpers shared by the descriptor codecs.
//!
//! # Conceptual Role
//!
//! Tor's v2 rendezvous protocol pins a handful of encodings:
//! - SHA-1 for every identifier and for the signed digest
//! - lowercase RFC 4648 base32 for identifiers and `.onion` addresses
//! - PEM-style armour (`-----BEGIN <LABEL>-----`) with 64-column base64
//!   bodies for keys, signatures and the introduction point block
//!
//! Changing any of these breaks interoperability with existing descriptors,
//! so they live here rather than being configurable.
//!
//! # Example
//!
//! ```rust
//! use onion_desc::util::{base32_decode, base32_encode};
//!
//! let encoded = base32_encode(&[0xd9, 0xb5, 0x47, 0xaf, 0x8f, 0x87, 0x95, 0x42, 0x8b, 0x8c]);
//! assert_eq!(encoded, "3g2upl4pq6kufc4m");
//! assert_eq!(base32_decode(&encoded).unwrap().len(), 10);
//! ```

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use data_encoding::BASE32;
use sha1::{Digest, Sha1};

/// Length of a SHA-1 digest in bytes.
pub const HASH_LENGTH: usize = 20;

/// Line width of base64 bodies inside PEM armour.
pub const PEM_LINE_LENGTH: usize = 64;

/// Accepts base64 with or without trailing `=` padding, as Tor objects vary.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Computes the SHA-1 digest of the concatenation of `parts`.
///
/// ```rust
/// use onion_desc::util::hash;
///
/// assert_eq!(hash(&[&b"ab"[..], &b"c"[..]]), hash(&[&b"abc"[..]]));
/// ```
pub fn hash(parts: &[&[u8]]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let mut digest = [0u8; HASH_LENGTH];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Encodes bytes as lowercase base32.
pub fn base32_encode(bytes: &[u8]) -> String {
    BASE32.encode(bytes).to_ascii_lowercase()
}

/// Decodes base32, case-insensitively. Returns `None` on invalid input.
pub fn base32_decode(input: &str) -> Option<Vec<u8>> {
    BASE32.decode(input.to_ascii_uppercase().as_bytes()).ok()
}

/// Encodes bytes as padded standard base64.
pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard base64, ignoring whitespace and tolerating missing padding.
pub fn base64_decode(input: &str) -> Option<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT_BASE64.decode(compact).ok()
}

/// Wraps `data` in PEM armour under `label`, with a trailing newline.
///
/// ```rust
/// use onion_desc::util::pem_encode;
///
/// assert_eq!(
///     pem_encode("SIGNATURE", b"hi"),
///     "-----BEGIN SIGNATURE-----\naGk=\n-----END SIGNATURE-----\n"
/// );
/// ```
pub fn pem_encode(label: &str, data: &[u8]) -> String {
    let encoded = base64_encode(data);
    let mut result = format!("-----BEGIN {}-----\n", label);
    // base64 output is ASCII, so byte chunks are valid char boundaries
    for chunk in encoded.as_bytes().chunks(PEM_LINE_LENGTH) {
        result.push_str(&String::from_utf8_lossy(chunk));
        result.push('\n');
    }
    result.push_str(&format!("-----END {}-----\n", label));
    result
}

/// Returns the label of a `-----BEGIN <LABEL>-----` line.
pub fn pem_begin_label(line: &str) -> Option<&str> {
    line.trim_end()
        .strip_prefix("-----BEGIN ")?
        .strip_suffix("-----")
}

/// Returns the label of a `-----END <LABEL>-----` line.
pub fn pem_end_label(line: &str) -> Option<&str> {
    line.trim_end()
        .strip_prefix("-----END ")?
        .strip_suffix("-----")
}
