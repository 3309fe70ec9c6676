//! Binary authentication certificates.
//!
//! Tor binds short-lived keys to long-lived ones with a compact,
//! fixed-layout certificate described in [cert-spec.txt]:
//!
//! ```text
//! version          1 byte
//! cert type        1 byte
//! expiration       4 bytes, big-endian hours since the Unix epoch
//! key type         1 byte
//! certified key   32 bytes
//! extension count  1 byte
//! extensions       count x [length (2, BE) | type (1) | flags (1) | data (length)]
//! signature       64 bytes
//! ```
//!
//! Every length on the wire is untrusted, so each read checks the
//! remaining buffer and reports the field that ran short. Bytes after the
//! signature are rejected.
//!
//! Extensions are keyed by type. When a certificate repeats a type the
//! last one wins, and [`Certificate::pack`] writes them back in ascending
//! type order.
//!
//! Signature verification is not performed here.
//!
//! # Example
//!
//! ```rust
//! use onion_desc::Certificate;
//!
//! let cert = Certificate::from_base64(
//!     "-----BEGIN ED25519 CERT-----
//! AQQABhtZAaW2GoBED1IjY3A6f6GNqBEl5A83fD2Za9upGke51JGqAQAgBABnprVR
//! ptIr43bWPo2fIzo3uOywfoMrryprpbm4HhCkZMaO064LP+1KNuLvlc8sGG8lTjx1
//! g4k3ELuWYgHYWU5rAia7nl4gUfBZOEfHAfKES7l3d63dBEjEX98Ljhdp2w4=
//! -----END ED25519 CERT-----",
//! )
//! .unwrap();
//!
//! assert_eq!(cert.version, 1);
//! assert_eq!(cert.expiration.to_string(), "2015-08-28 17:00:00 UTC");
//! assert!(cert.is_expired());
//! assert_eq!(cert.signing_key().map(|key| key.len()), Some(32));
//! ```
//!
//! [cert-spec.txt]: https://gitweb.torproject.org/torspec.git/tree/cert-spec.txt

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::CertificateError;
use crate::datatype::{take, CertType, Size};
use crate::util::{base64_decode, base64_encode, pem_begin_label, pem_encode};
use crate::Error;

/// Bytes before the extensions: version, type, expiration, key type, key
/// and extension count.
pub const CERTIFICATE_HEADER_LENGTH: usize = 40;

/// Length of the certified key.
pub const CERTIFIED_KEY_LENGTH: usize = 32;

/// Length of the trailing signature.
pub const CERTIFICATE_SIGNATURE_LENGTH: usize = 64;

/// Extension type carrying the key that signed the certificate.
pub const SIGNED_WITH_KEY_EXTENSION: u8 = 4;

/// Extension flag: the certificate must be rejected if this extension isn't
/// understood.
pub const AFFECTS_VALIDATION_FLAG: u8 = 1;

const PEM_LABEL: &str = "ED25519 CERT";

/// A certificate extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Extension {
    /// Extension type.
    pub ext_type: u8,
    /// Flag bits.
    pub flags: u8,
    /// Extension payload.
    pub data: Vec<u8>,
}

impl Extension {
    /// Returns whether the extension must be understood to validate the
    /// certificate.
    pub fn affects_validation(&self) -> bool {
        self.flags & AFFECTS_VALIDATION_FLAG != 0
    }

    /// Encodes the extension with its length prefix.
    ///
    /// ```rust
    /// use onion_desc::Extension;
    ///
    /// let ext = Extension { ext_type: 5, flags: 0, data: vec![0x11, 0x22] };
    /// assert_eq!(ext.pack().unwrap(), vec![0x00, 0x02, 0x05, 0x00, 0x11, 0x22]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::ExtensionTooLong`] if the data doesn't fit
    /// the two byte length prefix.
    pub fn pack(&self) -> Result<Vec<u8>, CertificateError> {
        let length = u16::try_from(self.data.len()).map_err(|_| CertificateError::ExtensionTooLong {
            ext_type: self.ext_type,
            length: self.data.len(),
        })?;

        let mut packed = Size::Short.pack(u32::from(length));
        packed.push(self.ext_type);
        packed.push(self.flags);
        packed.extend_from_slice(&self.data);
        Ok(packed)
    }

    /// Reads one extension off the front of `content`.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::Truncated`] if the header or the declared
    /// data length runs past the end of `content`.
    pub fn pop(content: &[u8]) -> Result<(Self, &[u8]), CertificateError> {
        let (data_size, content) = Size::Short.pop("extension length", content)?;
        let (ext_type, content) = Size::Char.pop("extension type", content)?;
        let (flags, content) = Size::Char.pop("extension flags", content)?;
        let (data, content) = take("extension data", content, data_size as usize)?;

        let extension = Extension {
            ext_type: ext_type as u8,
            flags: flags as u8,
            data: data.to_vec(),
        };
        Ok((extension, content))
    }
}

/// A decoded certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Format version.
    pub version: u8,
    /// Raw certificate type. See [`cert_type`](Self::cert_type).
    pub cert_type: u8,
    /// When the certificate stops being valid, to the hour.
    pub expiration: DateTime<Utc>,
    /// Type of the certified key.
    pub key_type: u8,
    /// The certified key.
    pub certified_key: [u8; CERTIFIED_KEY_LENGTH],
    /// Extensions by type.
    pub extensions: BTreeMap<u8, Extension>,
    /// Signature over everything before it.
    pub signature: [u8; CERTIFICATE_SIGNATURE_LENGTH],
}

impl Certificate {
    /// Decodes a certificate from its binary form.
    ///
    /// # Errors
    ///
    /// - [`CertificateError::Truncated`] if any field runs past the end of
    ///   `content`
    /// - [`CertificateError::TrailingBytes`] if bytes follow the signature
    /// - [`CertificateError::InvalidExpiration`] if the expiration can't be
    ///   represented as a timestamp
    pub fn unpack(content: &[u8]) -> Result<Self, Error> {
        let (version, content) = Size::Char.pop("version", content)?;
        let (cert_type, content) = Size::Char.pop("cert type", content)?;
        let (expiration_hours, content) = Size::Long.pop("expiration", content)?;
        let (key_type, content) = Size::Char.pop("key type", content)?;
        let (key_bytes, content) = take("certified key", content, CERTIFIED_KEY_LENGTH)?;
        let (extension_count, mut content) = Size::Char.pop("extension count", content)?;

        let expiration = DateTime::from_timestamp(i64::from(expiration_hours) * 3600, 0)
            .ok_or(CertificateError::InvalidExpiration(expiration_hours))?;

        let mut extensions = BTreeMap::new();
        for _ in 0..extension_count {
            let (extension, remainder) = Extension::pop(content)?;
            content = remainder;
            if let Some(previous) = extensions.insert(extension.ext_type, extension) {
                warn!(
                    ext_type = previous.ext_type,
                    "Duplicate certificate extension replaces an earlier one"
                );
            }
        }

        let (signature_bytes, content) = take("signature", content, CERTIFICATE_SIGNATURE_LENGTH)?;
        if !content.is_empty() {
            return Err(CertificateError::TrailingBytes(content.len()).into());
        }

        let mut certified_key = [0u8; CERTIFIED_KEY_LENGTH];
        certified_key.copy_from_slice(key_bytes);
        let mut signature = [0u8; CERTIFICATE_SIGNATURE_LENGTH];
        signature.copy_from_slice(signature_bytes);

        Ok(Certificate {
            version: version as u8,
            cert_type: cert_type as u8,
            expiration,
            key_type: key_type as u8,
            certified_key,
            extensions,
            signature,
        })
    }

    /// Decodes base64 text, with or without `ED25519 CERT` PEM armour.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::InvalidBase64`] if the text isn't base64,
    /// otherwise any error from [`unpack`](Self::unpack).
    pub fn from_base64(content: &str) -> Result<Self, Error> {
        let body: String = content
            .lines()
            .filter(|line| !line.trim_start().starts_with("-----"))
            .collect();

        let decoded = base64_decode(&body).ok_or_else(|| {
            let label = content.lines().next().and_then(pem_begin_label).unwrap_or("");
            CertificateError::InvalidBase64(if label.is_empty() {
                "not valid base64".to_string()
            } else {
                format!("{} block is not valid base64", label)
            })
        })?;
        Self::unpack(&decoded)
    }

    /// Encodes the certificate, extensions in ascending type order.
    ///
    /// The expiration is written in whole hours, so minutes and seconds are
    /// dropped.
    ///
    /// # Errors
    ///
    /// - [`CertificateError::ExpirationOutOfRange`] if the expiration is
    ///   before the epoch
    /// - [`CertificateError::TooManyExtensions`] for more than 255 extensions
    /// - [`CertificateError::ExtensionTooLong`] for extension data over
    ///   65535 bytes
    pub fn pack(&self) -> Result<Vec<u8>, CertificateError> {
        let hours = self.expiration.timestamp().div_euclid(3600);
        let hours = u32::try_from(hours).map_err(|_| CertificateError::ExpirationOutOfRange(hours))?;
        let count = u8::try_from(self.extensions.len())
            .map_err(|_| CertificateError::TooManyExtensions(self.extensions.len()))?;

        let mut packed = Vec::with_capacity(CERTIFICATE_HEADER_LENGTH + CERTIFICATE_SIGNATURE_LENGTH);
        packed.push(self.version);
        packed.push(self.cert_type);
        packed.extend(Size::Long.pack(hours));
        packed.push(self.key_type);
        packed.extend_from_slice(&self.certified_key);
        packed.push(count);
        for extension in self.extensions.values() {
            packed.extend(extension.pack()?);
        }
        packed.extend_from_slice(&self.signature);
        Ok(packed)
    }

    /// Base64 of [`pack`](Self::pack), without line breaks.
    pub fn to_base64(&self) -> Result<String, CertificateError> {
        Ok(base64_encode(&self.pack()?))
    }

    /// [`pack`](Self::pack) in `ED25519 CERT` PEM armour.
    pub fn to_base64_pem(&self) -> Result<String, CertificateError> {
        Ok(pem_encode(PEM_LABEL, &self.pack()?))
    }

    /// Typed view of [`cert_type`](Self::cert_type).
    pub fn cert_type(&self) -> CertType {
        CertType::get(self.cert_type)
    }

    /// Returns whether the expiration time has passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiration
    }

    /// Key from the signed-with-key extension, if present and 32 bytes long.
    pub fn signing_key(&self) -> Option<&[u8]> {
        self.extensions
            .get(&SIGNED_WITH_KEY_EXTENSION)
            .map(|extension| extension.data.as_slice())
            .filter(|key| key.len() == CERTIFIED_KEY_LENGTH)
    }
}

/// Writes [`Certificate::to_base64_pem`]. A certificate that can't be packed
/// yields [`fmt::Error`], which makes `to_string()` panic, so call
/// `to_base64_pem` directly for certificates assembled by hand.
impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pem = self.to_base64_pem().map_err(|_| fmt::Error)?;
        write!(f, "{}", pem)
    }
}
