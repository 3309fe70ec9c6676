//! Onion service descriptor and certificate handling.
//!
//! This module groups everything that touches Tor's v2 rendezvous service
//! descriptors and the binary authentication certificates used alongside
//! them.
//!
//! # Overview
//!
//! - [`identifier`] - Permanent id, secret id part and descriptor id derivation
//! - [`hidden`] - [`OnionDescriptor`](hidden::OnionDescriptor) and its text codec
//! - [`signing`] - Signing and verification of the canonical descriptor bytes
//! - [`certificate`] - Fixed-layout certificate decoding with extensions
//! - [`document`] - Keyword/argument/object tokenizer for descriptor text
//! - [`params`] - Protocol constants as an injectable value
//!
//! # Descriptor Sources
//!
//! Descriptors usually arrive as batches: a directory response, a cached
//! file, or a [CollecTor](https://metrics.torproject.org/collector.html)
//! archive entry with an `@type hidden-service-descriptor 1.0` annotation.
//! [`parse_file`] accepts all of these, decompressing gzip content when the
//! `compression` feature is enabled.
//!
//! # Error Taxonomy
//!
//! Every error maps onto one [`ErrorKind`]:
//!
//! | Kind | Raised by |
//! |------|-----------|
//! | [`ErrorKind::Validation`] | Replica out of range, malformed integer or time fields, certificate values too large to pack, foreign `@type` |
//! | [`ErrorKind::Codec`] | DER, base32, base64 or certificate bounds failures |
//! | [`ErrorKind::Signature`] | Signing callback failure, verification mismatch |
//! | [`ErrorKind::MalformedRecord`] | Missing required field, empty signature |
//!
//! Batch parsing treats any of these as a reason to skip one record. Single
//! value operations surface them to the caller.
//!
//! # See Also
//!
//! - [Tor Rendezvous Specification v2](https://gitweb.torproject.org/torspec.git/tree/rend-spec-v2.txt)
//! - [Tor Certificate Specification](https://gitweb.torproject.org/torspec.git/tree/cert-spec.txt)

pub mod certificate;
pub mod document;
pub mod hidden;
pub mod identifier;
pub mod params;
pub mod signing;

pub use certificate::{
    Certificate, Extension, CERTIFICATE_HEADER_LENGTH, CERTIFIED_KEY_LENGTH,
    CERTIFICATE_SIGNATURE_LENGTH,
};
pub use document::{parse_documents, Boundary, Document, DocumentEntry, DocumentObject};
pub use hidden::{parse_descriptors, OnionDescriptor, ParsedDescriptors};
pub use params::{DescriptorParams, DescriptorParamsBuilder};

use crate::Error;
#[cfg(feature = "compression")]
use flate2::read::GzDecoder;
#[cfg(feature = "compression")]
use std::io::Read;
use thiserror::Error as ThisError;

/// Errors raised while building, encoding or decoding onion service descriptors.
///
/// # Example
///
/// ```rust
/// use onion_desc::descriptor::HiddenServiceDescriptorError;
///
/// fn handle(err: HiddenServiceDescriptorError) {
///     match err {
///         HiddenServiceDescriptorError::ReplicaOutOfRange { replica, .. } => {
///             eprintln!("bad replica {}", replica);
///         }
///         HiddenServiceDescriptorError::MissingRequiredField(field) => {
///             eprintln!("record lacks {}", field);
///         }
///         _ => eprintln!("descriptor error: {}", err),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum HiddenServiceDescriptorError {
    /// Replica index outside of the allowed range.
    #[error("Replica {replica} is out of range [{min}, {max}]")]
    ReplicaOutOfRange {
        /// The rejected replica.
        replica: i32,
        /// Smallest allowed replica.
        min: u8,
        /// Largest allowed replica.
        max: u8,
    },

    /// Descriptor version is not a decimal integer.
    #[error("Invalid descriptor version: {0}")]
    InvalidVersion(String),

    /// Descriptor id is not valid base32 of the expected length.
    #[error("Invalid descriptor id: {0}")]
    InvalidDescriptorId(String),

    /// Secret id part is not valid base32 of the expected length.
    #[error("Invalid secret id part: {0}")]
    InvalidSecretIdPart(String),

    /// Publication time does not match `YYYY-MM-DD HH:MM:SS`.
    #[error("Invalid publication time: {0}")]
    InvalidPublicationTime(String),

    /// Protocol version list contains something other than integers.
    #[error("Invalid protocol version: {0}")]
    InvalidProtocolVersion(String),

    /// The permanent key could not be DER-encoded.
    #[error("Cannot encode permanent key as DER: {0}")]
    KeyEncoding(String),

    /// The permanent key object is not a valid PKCS#1 DER public key.
    #[error("Cannot decode permanent key from DER: {0}")]
    KeyDecoding(String),

    /// An object block is not valid base64.
    #[error("Invalid {0} object: not valid base64")]
    InvalidObject(String),

    /// Required field is missing from the record.
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// The signature field is present but carries no data.
    #[error("Empty signature")]
    EmptySignature,

    /// Content held no decodable descriptor.
    #[error("No onion service descriptor found")]
    NoDescriptor,
}

/// Errors raised while signing or verifying a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SignatureError {
    /// The signing callback reported a failure.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The signature does not match the descriptor digest.
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),
}

/// Errors raised while decoding binary certificates.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum CertificateError {
    /// A field extends past the end of the buffer.
    #[error("Certificate truncated at {field}: needed {needed} bytes but only {available} remain")]
    Truncated {
        /// Name of the field being read.
        field: &'static str,
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// Bytes remain after the signature.
    #[error("Certificate has {0} trailing bytes after the signature")]
    TrailingBytes(usize),

    /// The expiration is beyond the representable date range.
    #[error("Certificate expiration of {0} hours is out of range")]
    InvalidExpiration(u32),

    /// The textual form is not valid base64.
    #[error("Certificate wasn't properly base64 encoded: {0}")]
    InvalidBase64(String),

    /// Extension data is longer than its two byte length prefix can hold.
    #[error("Certificate extension {ext_type} has {length} bytes of data, at most 65535 fit")]
    ExtensionTooLong {
        /// Type of the offending extension.
        ext_type: u8,
        /// Length of its data.
        length: usize,
    },

    /// More extensions than the one byte count can hold.
    #[error("Certificate has {0} extensions, at most 255 fit")]
    TooManyExtensions(usize),

    /// The expiration can't be written as unsigned 32-bit hours since the epoch.
    #[error("Certificate expiration of {0} hours since the epoch can't be encoded")]
    ExpirationOutOfRange(i64),
}

/// Unified error type for all descriptor operations.
///
/// Wraps the per-family error types with transparent forwarding so the
/// underlying message and source chain are preserved.
#[derive(Debug, ThisError)]
pub enum DescriptorError {
    /// Error building, encoding or decoding an onion service descriptor.
    #[error(transparent)]
    HiddenService(#[from] HiddenServiceDescriptorError),

    /// Error signing or verifying a descriptor.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Error decoding a certificate.
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// Compression format is not supported.
    #[error("Unsupported compression format: {0}")]
    UnsupportedCompression(String),

    /// Decompression failed.
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    /// The content is annotated as some other kind of descriptor.
    #[error("Expected @type hidden-service-descriptor but found @type {0}")]
    UnexpectedType(String),
}

/// Coarse classification of descriptor errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input outside the accepted range or format.
    Validation,
    /// Binary or text encoding failure.
    Codec,
    /// Signing or verification failure.
    Signature,
    /// A record lacks a required field. Recoverable by skipping the record.
    MalformedRecord,
}

impl DescriptorError {
    /// Returns which taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use HiddenServiceDescriptorError as H;
        match self {
            DescriptorError::HiddenService(err) => match err {
                H::ReplicaOutOfRange { .. }
                | H::InvalidVersion(_)
                | H::InvalidPublicationTime(_)
                | H::InvalidProtocolVersion(_) => ErrorKind::Validation,
                H::InvalidDescriptorId(_)
                | H::InvalidSecretIdPart(_)
                | H::KeyEncoding(_)
                | H::KeyDecoding(_)
                | H::InvalidObject(_) => ErrorKind::Codec,
                H::MissingRequiredField(_) | H::EmptySignature | H::NoDescriptor => {
                    ErrorKind::MalformedRecord
                }
            },
            DescriptorError::Signature(_) => ErrorKind::Signature,
            DescriptorError::Certificate(
                CertificateError::ExtensionTooLong { .. }
                | CertificateError::TooManyExtensions(_)
                | CertificateError::ExpirationOutOfRange(_),
            ) => ErrorKind::Validation,
            DescriptorError::UnexpectedType(_) => ErrorKind::Validation,
            DescriptorError::Certificate(_)
            | DescriptorError::UnsupportedCompression(_)
            | DescriptorError::DecompressionFailed(_) => ErrorKind::Codec,
        }
    }
}

/// Compression formats a descriptor batch may arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    Plaintext,
    /// Gzip compression (RFC 1952).
    Gzip,
}

/// Detects the compression format of binary content from its magic bytes.
///
/// # Example
///
/// ```rust
/// use onion_desc::descriptor::{detect_compression, Compression};
///
/// assert_eq!(detect_compression(&[0x1f, 0x8b, 0x08, 0x00]), Compression::Gzip);
/// assert_eq!(detect_compression(b"rendezvous-service-descriptor"), Compression::Plaintext);
/// ```
pub fn detect_compression(content: &[u8]) -> Compression {
    if content.starts_with(&[0x1f, 0x8b]) {
        Compression::Gzip
    } else {
        Compression::Plaintext
    }
}

/// Decompresses content using the specified compression format.
///
/// # Errors
///
/// Returns [`DescriptorError::DecompressionFailed`] for corrupt data and
/// [`DescriptorError::UnsupportedCompression`] for gzip when the
/// `compression` feature is disabled.
pub fn decompress(content: &[u8], compression: Compression) -> Result<Vec<u8>, Error> {
    match compression {
        Compression::Plaintext => Ok(content.to_vec()),
        Compression::Gzip => decompress_gzip(content),
    }
}

#[cfg(feature = "compression")]
fn decompress_gzip(content: &[u8]) -> Result<Vec<u8>, Error> {
    let mut decoder = GzDecoder::new(content);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed).map_err(|e| {
        DescriptorError::DecompressionFailed(format!("Failed to decompress gzip: {}", e))
    })?;
    Ok(decompressed)
}

#[cfg(not(feature = "compression"))]
fn decompress_gzip(_content: &[u8]) -> Result<Vec<u8>, Error> {
    Err(DescriptorError::UnsupportedCompression("gzip (compression feature disabled)".into()).into())
}

/// Detects the compression format and decompresses accordingly.
pub fn auto_decompress(content: &[u8]) -> Result<Vec<u8>, Error> {
    decompress(content, detect_compression(content))
}

/// CollecTor type name of onion service descriptor archives.
pub const DESCRIPTOR_TYPE: &str = "hidden-service-descriptor";

/// Splits a leading `@type <name> <major>.<minor>` line off raw content,
/// returning the type name.
///
/// ```rust
/// use onion_desc::descriptor::strip_type_annotation;
///
/// let (name, rest) = strip_type_annotation(b"@type hidden-service-descriptor 1.0\nversion 2\n");
/// assert_eq!(name, Some("hidden-service-descriptor"));
/// assert_eq!(rest, b"version 2\n");
/// ```
pub fn strip_type_annotation(content: &[u8]) -> (Option<&str>, &[u8]) {
    let first_line_end = content
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(content.len());
    let name = std::str::from_utf8(&content[..first_line_end])
        .ok()
        .and_then(annotation_name);

    match name {
        Some(name) => {
            let rest = content.get(first_line_end + 1..).unwrap_or(&[]);
            (Some(name), rest)
        }
        None => (None, content),
    }
}

fn annotation_name(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("@type ")?;
    let mut parts = rest.split_whitespace();
    let (name, version) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let (major, minor) = version.split_once('.')?;
    major.parse::<u32>().ok()?;
    minor.parse::<u32>().ok()?;
    Some(name)
}

/// Parses a batch of onion service descriptors from file content.
///
/// Decompresses the content if needed, strips an `@type` annotation, then
/// runs [`parse_descriptors`]. Records that fail to decode are skipped.
///
/// # Errors
///
/// Decompression failures, and [`DescriptorError::UnexpectedType`] when the
/// annotation names a type other than [`DESCRIPTOR_TYPE`]. Per-record
/// failures are reported in [`ParsedDescriptors::skipped`].
///
/// # Example
///
/// ```rust,no_run
/// use onion_desc::descriptor::parse_file;
///
/// let content = std::fs::read("hidden-service-descriptors").unwrap();
/// let parsed = parse_file(&content).unwrap();
/// println!("{} descriptors, {} skipped", parsed.descriptors.len(), parsed.skipped.len());
/// ```
pub fn parse_file(content: &[u8]) -> Result<ParsedDescriptors, Error> {
    let decompressed = auto_decompress(content)?;
    let (name, stripped) = strip_type_annotation(&decompressed);
    if let Some(name) = name.filter(|name| *name != DESCRIPTOR_TYPE) {
        return Err(DescriptorError::UnexpectedType(name.to_string()).into());
    }
    Ok(parse_descriptors(stripped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_compression_plaintext() {
        let content = b"@type hidden-service-descriptor 1.0\nrendezvous-service-descriptor";
        assert_eq!(detect_compression(content), Compression::Plaintext);
    }

    #[test]
    fn test_detect_compression_gzip() {
        assert_eq!(detect_compression(&[0x1f, 0x8b, 0x08]), Compression::Gzip);
    }

    #[cfg(not(feature = "compression"))]
    #[test]
    fn test_gzip_without_feature() {
        let err = decompress(&[0x1f, 0x8b, 0x08], Compression::Gzip).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_decompress_gzip() {
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"version 2\n").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(auto_decompress(&compressed).unwrap(), b"version 2\n");
    }

    #[test]
    fn test_decompress_corrupt_gzip() {
        assert!(auto_decompress(&[0x1f, 0x8b, 0x00, 0x01, 0x02]).is_err());
    }

    #[test]
    fn test_annotation_name() {
        assert_eq!(
            annotation_name("@type hidden-service-descriptor 1.0"),
            Some("hidden-service-descriptor")
        );
        assert_eq!(annotation_name("@type server-descriptor 1.2"), Some("server-descriptor"));
        assert!(annotation_name("@type hidden-service-descriptor").is_none());
        assert!(annotation_name("@type x 1").is_none());
        assert!(annotation_name("@type x 1.0 extra").is_none());
        assert!(annotation_name("rendezvous-service-descriptor abc").is_none());
    }

    #[test]
    fn test_strip_type_annotation() {
        let content = b"@type hidden-service-descriptor 1.0\nversion 2\n";
        let (annotation, rest) = strip_type_annotation(content);
        assert_eq!(annotation, Some(DESCRIPTOR_TYPE));
        assert_eq!(rest, b"version 2\n");

        let content = b"version 2\n";
        let (annotation, rest) = strip_type_annotation(content);
        assert!(annotation.is_none());
        assert_eq!(rest, content);
    }

    #[test]
    fn test_error_kinds() {
        let err: DescriptorError = HiddenServiceDescriptorError::EmptySignature.into();
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);

        let err: DescriptorError = HiddenServiceDescriptorError::ReplicaOutOfRange {
            replica: 2,
            min: 0,
            max: 1,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: DescriptorError = SignatureError::SignatureMismatch("bad".into()).into();
        assert_eq!(err.kind(), ErrorKind::Signature);

        let err: DescriptorError = CertificateError::TrailingBytes(3).into();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_parse_file_rejects_other_types() {
        let err = parse_file(b"@type server-descriptor 1.0\nrouter foo 10.0.0.1 9001 0 0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "descriptor error: Expected @type hidden-service-descriptor but found @type server-descriptor"
        );
    }

    #[test]
    fn test_parse_file_without_annotation() {
        let parsed = parse_file(b"router foo 10.0.0.1 9001 0 0\n").unwrap();
        assert!(parsed.descriptors.is_empty());
        assert_eq!(parsed.skipped.len(), 1);
    }
}
