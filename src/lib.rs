//! # onion-desc
//!
//! Construction, parsing, signing and verification of Tor v2 onion service
//! descriptors, plus decoding of Tor's Ed25519 authentication certificates.
//!
//! # Overview
//!
//! A v2 onion service publishes a *rendezvous service descriptor* under an
//! identifier that changes every day. The identifier ties together three
//! values:
//!
//! - the **permanent id**: the first 10 bytes of the SHA-1 of the service's
//!   DER-encoded RSA key (its base32 form is the `.onion` address)
//! - the **secret id part**: a hash of the current 24-hour time period and a
//!   replica number
//! - the **descriptor id**: the hash of the two above
//!
//! This crate derives those identifiers, renders the descriptor in the exact
//! line layout used by the Tor directory protocol, signs the canonical bytes
//! with a caller-supplied RSA signer, and parses descriptor batches back,
//! skipping malformed records rather than failing the whole batch.
//!
//! It also decodes the fixed-layout binary certificates used throughout Tor
//! (version, type, expiration, certified key, extensions, signature).
//!
//! # Architecture
//!
//! - [`descriptor::identifier`]: permanent id, secret id part and descriptor id derivation
//! - [`descriptor::hidden`]: the [`OnionDescriptor`] type and its text codec
//! - [`descriptor::signing`]: digest computation, signing and verification
//! - [`descriptor::certificate`]: binary certificate decoding and encoding
//! - [`descriptor::document`]: keyword/argument/object tokenizer for descriptor text
//! - [`descriptor::params`]: protocol constants as an injectable value
//! - [`util`]: SHA-1, base32, base64 and PEM helpers
//! - [`logging`]: opt-in `tracing` subscriber setup
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use onion_desc::descriptor::signing::rsa_signer;
//! use onion_desc::OnionDescriptor;
//! use rsa::pkcs1::DecodeRsaPrivateKey;
//! use rsa::RsaPrivateKey;
//!
//! # fn example(pem: &str) -> Result<(), onion_desc::Error> {
//! let private_key = RsaPrivateKey::from_pkcs1_pem(pem).expect("valid key");
//! let mut descriptor = OnionDescriptor::new(private_key.to_public_key());
//!
//! descriptor.update(0)?;
//! descriptor.sign(rsa_signer(&private_key))?;
//! descriptor.verify_signature()?;
//!
//! let wire = descriptor.to_bytes()?;
//! let parsed = onion_desc::descriptor::hidden::parse_descriptors(&wire);
//! assert_eq!(parsed.descriptors.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every fallible operation returns [`enum@Error`]. Batch parsing never fails:
//! records that cannot be decoded are reported in
//! [`ParsedDescriptors::skipped`](descriptor::hidden::ParsedDescriptors::skipped)
//! and logged at `warn` level.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod datatype;
pub mod descriptor;
pub mod logging;
pub mod util;

// Re-export commonly used types at crate root
pub use descriptor::certificate::{Certificate, Extension};
pub use descriptor::hidden::OnionDescriptor;
pub use descriptor::{DescriptorError, ErrorKind};

use thiserror::Error;

/// Errors that can occur during onion-desc operations.
///
/// Every failure is a [`Descriptor`](Error::Descriptor) error, raised while
/// deriving, encoding, decoding, signing or verifying. The crate reads no
/// files itself, so callers handle their own I/O errors.
///
/// # Recovery Guide
///
/// | Error kind | Recoverable | Retry Meaningful |
/// |------------|-------------|------------------|
/// | [`ErrorKind::Validation`] | Yes, with different input | No |
/// | [`ErrorKind::Codec`] | No | No |
/// | [`ErrorKind::Signature`] | No | No |
/// | [`ErrorKind::MalformedRecord`] | Skip the record | No |
///
/// # Example
///
/// ```rust
/// use onion_desc::{Error, ErrorKind};
///
/// fn handle_error(err: Error) {
///     match err.kind() {
///         ErrorKind::MalformedRecord => eprintln!("skipping: {}", err),
///         ErrorKind::Signature => eprintln!("untrusted descriptor: {}", err),
///         _ => eprintln!("Error: {}", err),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// Failure while deriving, encoding, decoding, signing or verifying.
    ///
    /// See [`descriptor::DescriptorError`] for the specific variants.
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

impl Error {
    /// Returns the taxonomy bucket of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Descriptor(err) => err.kind(),
        }
    }
}

impl From<descriptor::HiddenServiceDescriptorError> for Error {
    fn from(err: descriptor::HiddenServiceDescriptorError) -> Self {
        Error::Descriptor(err.into())
    }
}

impl From<descriptor::SignatureError> for Error {
    fn from(err: descriptor::SignatureError) -> Self {
        Error::Descriptor(err.into())
    }
}

impl From<descriptor::CertificateError> for Error {
    fn from(err: descriptor::CertificateError) -> Self {
        Error::Descriptor(err.into())
    }
}
