//! Big-endian integer fields and certificate type codes.
//!
//! Tor's binary formats are sequences of fixed-width unsigned integers in
//! network byte order, interleaved with length-prefixed byte strings. The
//! helpers here read those fields off the front of a buffer and report the
//! field name when the buffer runs short, so callers can decode a record
//! with a chain of `?`.
//!
//! # Example
//!
//! ```rust
//! use onion_desc::datatype::{take, Size};
//!
//! let buffer = [0x01, 0x00, 0x03, 0xaa, 0xbb, 0xcc];
//! let (version, rest) = Size::Char.pop("version", &buffer).unwrap();
//! let (length, rest) = Size::Short.pop("length", rest).unwrap();
//! let (data, rest) = take("data", rest, length as usize).unwrap();
//!
//! assert_eq!(version, 1);
//! assert_eq!(data, &[0xaa, 0xbb, 0xcc]);
//! assert!(rest.is_empty());
//! ```

use crate::descriptor::CertificateError;

/// Width of a big-endian unsigned integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    /// Unsigned 8-bit integer (1 byte).
    Char,
    /// Unsigned 16-bit integer (2 bytes, big-endian).
    Short,
    /// Unsigned 32-bit integer (4 bytes, big-endian).
    Long,
}

impl Size {
    /// Returns the size in bytes for this integer type.
    pub fn size(&self) -> usize {
        match self {
            Size::Char => 1,
            Size::Short => 2,
            Size::Long => 4,
        }
    }

    /// Packs an integer value into big-endian bytes, truncating to fit.
    ///
    /// ```rust
    /// use onion_desc::datatype::Size;
    ///
    /// assert_eq!(Size::Char.pack(0x12), vec![0x12]);
    /// assert_eq!(Size::Short.pack(0x1234), vec![0x12, 0x34]);
    /// assert_eq!(Size::Long.pack(0x12345678), vec![0x12, 0x34, 0x56, 0x78]);
    /// ```
    pub fn pack(&self, value: u32) -> Vec<u8> {
        match self {
            Size::Char => vec![value as u8],
            Size::Short => (value as u16).to_be_bytes().to_vec(),
            Size::Long => value.to_be_bytes().to_vec(),
        }
    }

    /// Reads an integer from the start of `data`, returning the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::Truncated`] naming `field` if `data` is
    /// shorter than [`size`](Self::size).
    pub fn pop<'a>(
        &self,
        field: &'static str,
        data: &'a [u8],
    ) -> Result<(u32, &'a [u8]), CertificateError> {
        let (bytes, rest) = take(field, data, self.size())?;
        let value = bytes
            .iter()
            .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
        Ok((value, rest))
    }
}

/// Splits `len` bytes off the front of `data`.
///
/// # Errors
///
/// Returns [`CertificateError::Truncated`] naming `field` if fewer than `len`
/// bytes remain.
pub fn take<'a>(
    field: &'static str,
    data: &'a [u8],
    len: usize,
) -> Result<(&'a [u8], &'a [u8]), CertificateError> {
    if data.len() < len {
        return Err(CertificateError::Truncated {
            field,
            needed: len,
            available: data.len(),
        });
    }
    Ok(data.split_at(len))
}

/// Purpose of a certificate, from Tor's cert-spec type registry.
///
/// ```rust
/// use onion_desc::datatype::CertType;
///
/// assert_eq!(CertType::get(4), CertType::Ed25519Signing);
/// assert_eq!(CertType::get(200), CertType::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertType {
    /// Link key certificate certified by RSA1024 identity.
    Link,
    /// RSA1024 identity certificate.
    Identity,
    /// RSA1024 AUTHENTICATE cell link certificate.
    Authenticate,
    /// Ed25519 signing key, signed with identity key.
    Ed25519Signing,
    /// TLS link certificate, signed with Ed25519 signing key.
    LinkCert,
    /// Ed25519 AUTHENTICATE cell key, signed with Ed25519 signing key.
    Ed25519Authenticate,
    /// Ed25519 identity, signed with RSA identity.
    Ed25519Identity,
    /// Onion service short-term descriptor signing key.
    HsDescSigning,
    /// Onion service introduction point authentication key.
    HsIntroAuth,
    /// ntor onion key cross-certifying Ed25519 identity key.
    NtorOnionKey,
    /// Onion service ntor-extra encryption key.
    HsNtorEnc,
    /// Unrecognized certificate type.
    Unknown,
}

impl CertType {
    /// Maps a raw type byte to a `CertType`. The certificate keeps the raw
    /// byte, so unknown values still survive a round trip.
    pub fn get(val: u8) -> CertType {
        match val {
            1 => CertType::Link,
            2 => CertType::Identity,
            3 => CertType::Authenticate,
            4 => CertType::Ed25519Signing,
            5 => CertType::LinkCert,
            6 => CertType::Ed25519Authenticate,
            7 => CertType::Ed25519Identity,
            8 => CertType::HsDescSigning,
            9 => CertType::HsIntroAuth,
            10 => CertType::NtorOnionKey,
            11 => CertType::HsNtorEnc,
            _ => CertType::Unknown,
        }
    }
}
