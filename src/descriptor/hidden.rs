//! Version 2 onion service descriptors.
//!
//! A v2 onion service periodically publishes a *rendezvous service
//! descriptor* to the hidden service directories responsible for its
//! current descriptor id. The descriptor carries the service's RSA
//! permanent key, the identifiers derived from it, the introduction points
//! clients should contact, and an RSA signature over the whole document.
//!
//! # Wire Format
//!
//! The canonical layout is fixed line by line, and the signature covers its
//! exact bytes:
//!
//! ```text
//! rendezvous-service-descriptor <base32 descriptor id>
//! version 2
//! permanent-key
//! -----BEGIN RSA PUBLIC KEY-----
//! <base64 PKCS#1 DER>
//! -----END RSA PUBLIC KEY-----
//! secret-id-part <base32 secret id part>
//! publication-time YYYY-MM-DD HH:MM:SS
//! protocol-versions 2,3
//! introduction-points
//! -----BEGIN MESSAGE-----
//! <base64 introduction point block>
//! -----END MESSAGE-----
//! signature
//! -----BEGIN SIGNATURE-----
//! <base64 signature>
//! -----END SIGNATURE-----
//! ```
//!
//! The `introduction-points` entry is omitted when the block is empty, and
//! the `SIGNATURE` object is omitted while the descriptor is unsigned.
//!
//! The introduction point block is carried as opaque bytes. It may be
//! encrypted for client authorization and is never interpreted here.
//!
//! # Example
//!
//! ```rust
//! use onion_desc::descriptor::hidden::parse_descriptors;
//!
//! let parsed = parse_descriptors(b"rendezvous-service-descriptor aaaa\nversion 2\n");
//! assert!(parsed.descriptors.is_empty());
//! assert_eq!(parsed.skipped.len(), 1);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, DurationRound, NaiveDateTime, Utc};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::RsaPublicKey;
use tracing::{debug, warn};

use super::document::{parse_documents, Boundary, Document};
use super::identifier::{self, encode_key};
use super::params::DescriptorParams;
use super::HiddenServiceDescriptorError;
use crate::util::{base32_decode, base32_encode, pem_encode, HASH_LENGTH};
use crate::Error;

/// Keyword opening every descriptor.
pub const DESCRIPTOR_KEYWORD: &str = "rendezvous-service-descriptor";

const SIGNATURE_KEYWORD: &str = "signature";

/// Each descriptor opens with its id line and closes with its signature.
const DESCRIPTOR_BOUNDARY: Boundary<'static> = Boundary::new(DESCRIPTOR_KEYWORD, SIGNATURE_KEYWORD);

const PUBLICATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A v2 rendezvous service descriptor.
///
/// Built descriptors start from [`new`](Self::new) and get their
/// identifiers from [`update`](Self::update). Parsed descriptors hold
/// exactly what was on the wire and are never re-derived.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use onion_desc::OnionDescriptor;
/// use rsa::pkcs1::DecodeRsaPublicKey;
/// use rsa::RsaPublicKey;
///
/// let der = onion_desc::util::base64_decode(
///     "MIGJAoGBAJ/SzzgrXPxTlFrKVhXh3buCWv2QfcNgncUpDpKouLn3AtPH5Ocys0jE\
///      aZSKdvaiQ62md2gOwj4x61cFNdi05tdQjS+2thHKEm/KsB9BGLSLBNJYY356bupg\
///      I5gQozM65ENelfxYlysBjJ52xSDBd8C4f/p9umdzaaaCmzXG/nhzAgMBAAE=",
/// ).unwrap();
/// let key = RsaPublicKey::from_pkcs1_der(&der).unwrap();
///
/// let mut descriptor = OnionDescriptor::new(key);
/// let now = Utc.with_ymd_and_hms(2015, 2, 23, 20, 34, 56).unwrap();
/// descriptor.update_at(0, now).unwrap();
///
/// assert_eq!(descriptor.onion_address().unwrap(), "3g2upl4pq6kufc4m");
/// assert_eq!(descriptor.descriptor_id_base32(), "y3olqqblqw2gbh6phimfuiroechjjafa");
/// assert_eq!(descriptor.publication_time.to_string(), "2015-02-23 20:00:00 UTC");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnionDescriptor {
    /// `H(permanent_id || secret_id_part)`.
    pub descriptor_id: [u8; HASH_LENGTH],
    /// Descriptor format version.
    pub version: u32,
    /// The service's long-term RSA key.
    pub permanent_key: RsaPublicKey,
    /// `H(time_period || replica)`.
    pub secret_id_part: [u8; HASH_LENGTH],
    /// When the descriptor was generated, rounded down to the hour by `update`.
    pub publication_time: DateTime<Utc>,
    /// Supported introduction protocol versions.
    pub protocol_versions: Vec<u32>,
    /// Opaque introduction point block. Empty when there is none.
    pub introduction_points: Vec<u8>,
    /// RSA signature over the canonical bytes. Empty while unsigned.
    pub signature: Vec<u8>,
}

impl OnionDescriptor {
    /// Creates an unsigned descriptor for `permanent_key` with every other
    /// field zeroed.
    pub fn new(permanent_key: RsaPublicKey) -> Self {
        Self {
            descriptor_id: [0; HASH_LENGTH],
            version: 0,
            permanent_key,
            secret_id_part: [0; HASH_LENGTH],
            publication_time: DateTime::<Utc>::default(),
            protocol_versions: Vec::new(),
            introduction_points: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// Derives identifiers for `replica` at the current time.
    ///
    /// # Errors
    ///
    /// See [`update_with`](Self::update_with).
    pub fn update(&mut self, replica: i32) -> Result<(), Error> {
        self.update_at(replica, Utc::now())
    }

    /// Derives identifiers for `replica` at `now`.
    ///
    /// # Errors
    ///
    /// See [`update_with`](Self::update_with).
    pub fn update_at(&mut self, replica: i32, now: DateTime<Utc>) -> Result<(), Error> {
        self.update_with(&DescriptorParams::default(), replica, now)
    }

    /// Sets the version and protocol versions from `params`, rounds `now`
    /// down to the hour as the publication time, and derives the secret id
    /// part and descriptor id from it.
    ///
    /// The descriptor is left untouched on failure.
    ///
    /// # Errors
    ///
    /// - [`HiddenServiceDescriptorError::ReplicaOutOfRange`] if `replica` is
    ///   outside `[params.min_replica, params.max_replica]`
    /// - [`HiddenServiceDescriptorError::KeyEncoding`] if the permanent key
    ///   cannot be DER-encoded
    pub fn update_with(
        &mut self,
        params: &DescriptorParams,
        replica: i32,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let replica = params.check_replica(replica)?;
        let permanent_id = identifier::permanent_id(&self.permanent_key)?;
        let publication_time = now
            .duration_trunc(Duration::hours(1))
            .map_err(|e| HiddenServiceDescriptorError::InvalidPublicationTime(e.to_string()))?;

        let secret_id_part =
            identifier::secret_id(&permanent_id, publication_time.timestamp(), replica);
        let descriptor_id = identifier::descriptor_id(&permanent_id, &secret_id_part);

        self.version = params.version;
        self.protocol_versions = params.protocol_versions.clone();
        self.publication_time = publication_time;
        self.secret_id_part = secret_id_part;
        self.descriptor_id = descriptor_id;

        debug!(
            descriptor_id = %base32_encode(&descriptor_id),
            replica,
            publication_time = %publication_time,
            "Derived descriptor identifiers"
        );
        Ok(())
    }

    /// Lowercase base32 form of the descriptor id.
    pub fn descriptor_id_base32(&self) -> String {
        base32_encode(&self.descriptor_id)
    }

    /// The service's 16-character onion address, without `.onion`.
    ///
    /// # Errors
    ///
    /// Returns [`HiddenServiceDescriptorError::KeyEncoding`] if the permanent
    /// key cannot be DER-encoded.
    pub fn onion_address(&self) -> Result<String, Error> {
        identifier::onion_address(&self.permanent_key)
    }

    /// Returns whether a signature is present.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Renders the canonical descriptor bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HiddenServiceDescriptorError::KeyEncoding`] if the permanent
    /// key cannot be DER-encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.render(&self.signature)?.into_bytes())
    }

    /// Renders the canonical text with `signature` in place of the stored
    /// one. An empty `signature` yields the signable form.
    pub(crate) fn render(&self, signature: &[u8]) -> Result<String, Error> {
        let key_der = encode_key(&self.permanent_key)?;
        let protocol_versions = self
            .protocol_versions
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut result = String::new();
        result.push_str(&format!(
            "{} {}\n",
            DESCRIPTOR_KEYWORD,
            base32_encode(&self.descriptor_id)
        ));
        result.push_str(&format!("version {}\n", self.version));
        result.push_str("permanent-key\n");
        result.push_str(&pem_encode("RSA PUBLIC KEY", &key_der));
        result.push_str(&format!(
            "secret-id-part {}\n",
            base32_encode(&self.secret_id_part)
        ));
        result.push_str(&format!(
            "publication-time {}\n",
            self.publication_time.format(PUBLICATION_TIME_FORMAT)
        ));
        result.push_str(&format!("protocol-versions {}\n", protocol_versions));

        if !self.introduction_points.is_empty() {
            result.push_str("introduction-points\n");
            result.push_str(&pem_encode("MESSAGE", &self.introduction_points));
        }

        result.push_str("signature\n");
        if !signature.is_empty() {
            result.push_str(&pem_encode("SIGNATURE", signature));
        }

        Ok(result)
    }

    /// Decodes one tokenized record.
    ///
    /// Every field of the canonical layout is required except
    /// `introduction-points`, and the signature must be non-empty.
    ///
    /// # Errors
    ///
    /// - [`HiddenServiceDescriptorError::MissingRequiredField`] for an absent entry
    /// - [`HiddenServiceDescriptorError::EmptySignature`] for a `signature`
    ///   entry without data
    /// - a field-specific variant when an entry is malformed
    pub fn from_document(document: &Document) -> Result<Self, Error> {
        let descriptor_id = decode_identifier(
            required_argument(document, DESCRIPTOR_KEYWORD)?,
            HiddenServiceDescriptorError::InvalidDescriptorId,
        )?;

        let version_text = required_argument(document, "version")?;
        let version = version_text
            .trim()
            .parse::<u32>()
            .map_err(|_| HiddenServiceDescriptorError::InvalidVersion(version_text.to_string()))?;

        let key_der = required_object(document, "permanent-key")?;
        let permanent_key = RsaPublicKey::from_pkcs1_der(&key_der)
            .map_err(|e| HiddenServiceDescriptorError::KeyDecoding(e.to_string()))?;

        let secret_id_part = decode_identifier(
            required_argument(document, "secret-id-part")?,
            HiddenServiceDescriptorError::InvalidSecretIdPart,
        )?;

        let time_text = required_argument(document, "publication-time")?;
        let publication_time = NaiveDateTime::parse_from_str(time_text.trim(), PUBLICATION_TIME_FORMAT)
            .map_err(|e| {
                HiddenServiceDescriptorError::InvalidPublicationTime(format!(
                    "{} - {}",
                    time_text, e
                ))
            })?
            .and_utc();

        let protocol_versions =
            parse_protocol_versions(required_argument(document, "protocol-versions")?)?;

        let introduction_points = match document.entry("introduction-points") {
            Some(_) => optional_object(document, "introduction-points")?,
            None => Vec::new(),
        };

        if document.entry(SIGNATURE_KEYWORD).is_none() {
            return Err(missing(SIGNATURE_KEYWORD));
        }
        let signature = optional_object(document, SIGNATURE_KEYWORD)?;
        if signature.is_empty() {
            return Err(HiddenServiceDescriptorError::EmptySignature.into());
        }

        Ok(Self {
            descriptor_id,
            version,
            permanent_key,
            secret_id_part,
            publication_time,
            protocol_versions,
            introduction_points,
            signature,
        })
    }

    /// Parses the first descriptor in `content`. Annotation lines are
    /// ignored and anything after the first record is not examined.
    ///
    /// # Errors
    ///
    /// Returns [`HiddenServiceDescriptorError::NoDescriptor`] if `content`
    /// holds no record, otherwise any error from
    /// [`from_document`](Self::from_document).
    pub fn parse(content: &str) -> Result<Self, Error> {
        let (documents, _) = parse_documents(content.as_bytes(), DESCRIPTOR_BOUNDARY);
        let document = documents
            .first()
            .ok_or(HiddenServiceDescriptorError::NoDescriptor)?;
        Self::from_document(document)
    }
}

impl FromStr for OnionDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Writes the same text as [`OnionDescriptor::to_bytes`].
///
/// Encoding the permanent key can fail, and `Display` has no way to say why,
/// so that case becomes [`fmt::Error`] and `to_string()` panics on it. Use
/// `to_bytes` where the key did not come from this crate's own parser.
impl fmt::Display for OnionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.render(&self.signature).map_err(|_| fmt::Error)?;
        write!(f, "{}", text)
    }
}

/// Result of decoding a batch of descriptors.
#[derive(Debug, Default)]
pub struct ParsedDescriptors {
    /// Records that decoded successfully, in input order.
    pub descriptors: Vec<OnionDescriptor>,
    /// Index of each record that was skipped, with the reason.
    pub skipped: Vec<(usize, Error)>,
    /// Trailing bytes the tokenizer could not consume.
    pub remainder: Vec<u8>,
}

/// Decodes every descriptor in `content`, skipping records that fail.
///
/// Never fails. Each skipped record is logged at `warn` level and reported
/// in [`ParsedDescriptors::skipped`].
pub fn parse_descriptors(content: &[u8]) -> ParsedDescriptors {
    let (documents, remainder) = parse_documents(content, DESCRIPTOR_BOUNDARY);
    if !remainder.is_empty() {
        warn!(
            bytes = remainder.len(),
            "Trailing descriptor content could not be tokenized"
        );
    }

    documents.iter().enumerate().fold(
        ParsedDescriptors {
            remainder: remainder.to_vec(),
            ..ParsedDescriptors::default()
        },
        |mut parsed, (index, document)| {
            match OnionDescriptor::from_document(document) {
                Ok(descriptor) => parsed.descriptors.push(descriptor),
                Err(err) => {
                    warn!(index, error = %err, "Skipping malformed onion service descriptor");
                    parsed.skipped.push((index, err));
                }
            }
            parsed
        },
    )
}

fn missing(keyword: &str) -> Error {
    HiddenServiceDescriptorError::MissingRequiredField(keyword.to_string()).into()
}

fn required_argument<'a>(document: &'a Document, keyword: &str) -> Result<&'a str, Error> {
    document
        .arguments(keyword)
        .first()
        .copied()
        .ok_or_else(|| missing(keyword))
}

fn required_object(document: &Document, keyword: &str) -> Result<Vec<u8>, Error> {
    let object = document
        .entry(keyword)
        .and_then(|entry| entry.object.as_ref())
        .ok_or_else(|| missing(keyword))?;
    object
        .data()
        .ok_or_else(|| HiddenServiceDescriptorError::InvalidObject(keyword.to_string()).into())
}

/// Object bytes of `keyword`, or empty if the entry has no object.
fn optional_object(document: &Document, keyword: &str) -> Result<Vec<u8>, Error> {
    match document.entry(keyword).and_then(|entry| entry.object.as_ref()) {
        Some(object) => object
            .data()
            .ok_or_else(|| HiddenServiceDescriptorError::InvalidObject(keyword.to_string()).into()),
        None => Ok(Vec::new()),
    }
}

fn decode_identifier(
    text: &str,
    invalid: fn(String) -> HiddenServiceDescriptorError,
) -> Result<[u8; HASH_LENGTH], Error> {
    let bytes = base32_decode(text.trim()).ok_or_else(|| invalid(text.to_string()))?;
    <[u8; HASH_LENGTH]>::try_from(bytes.as_slice()).map_err(|_| invalid(text.to_string()).into())
}

fn parse_protocol_versions(value: &str) -> Result<Vec<u32>, Error> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }

    value
        .split(',')
        .map(|v| {
            let v = v.trim();
            v.parse::<u32>().map_err(|_| {
                Error::from(HiddenServiceDescriptorError::InvalidProtocolVersion(
                    v.to_string(),
                ))
            })
        })
        .collect()
}
