//! Derivation of v2 onion service identifiers.
//!
//! Three values identify a v2 descriptor on the hidden service directory
//! ring:
//!
//! ```text
//! permanent_id  = H(DER(public key))[..10]
//! time_period   = (unix_time + permanent_id[0] * 86400 / 256) / 86400
//! secret_id     = H(BE32(time_period) || replica)
//! descriptor_id = H(permanent_id || secret_id)
//! ```
//!
//! `H` is SHA-1. Adding a slice of the day derived from the first byte of
//! the permanent id staggers the moment each service's descriptor id rolls
//! over, so services do not all change identifiers at midnight UTC.
//!
//! All arithmetic on the time period wraps at 32 bits, matching Tor.
//!
//! # Example
//!
//! ```rust
//! use onion_desc::descriptor::identifier::{descriptor_id, secret_id};
//! use onion_desc::util::base32_encode;
//!
//! let permanent_id = [0xd9, 0xb5, 0x47, 0xaf, 0x8f, 0x87, 0x95, 0x42, 0x8b, 0x8c];
//! let secret = secret_id(&permanent_id, 1_424_721_600, 0);
//! let id = descriptor_id(&permanent_id, &secret);
//!
//! assert_eq!(base32_encode(&id), "y3olqqblqw2gbh6phimfuiroechjjafa");
//! ```

use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::RsaPublicKey;

use super::HiddenServiceDescriptorError;
use crate::util::{base32_encode, hash, HASH_LENGTH};
use crate::Error;

/// Length of a permanent id in bytes.
pub const PERMANENT_ID_LENGTH: usize = 10;

/// Seconds in one time period.
pub const TIME_PERIOD_LENGTH: u32 = 86_400;

/// Returns the PKCS#1 DER encoding of `key`.
///
/// # Errors
///
/// Returns [`HiddenServiceDescriptorError::KeyEncoding`] if the key cannot
/// be encoded.
pub fn encode_key(key: &RsaPublicKey) -> Result<Vec<u8>, Error> {
    let der = key
        .to_pkcs1_der()
        .map_err(|e| HiddenServiceDescriptorError::KeyEncoding(e.to_string()))?;
    Ok(der.as_bytes().to_vec())
}

/// Computes the permanent id: the first 10 bytes of the SHA-1 of the key's
/// PKCS#1 DER encoding.
///
/// # Errors
///
/// Returns [`HiddenServiceDescriptorError::KeyEncoding`] if the key cannot
/// be encoded.
pub fn permanent_id(key: &RsaPublicKey) -> Result<[u8; PERMANENT_ID_LENGTH], Error> {
    let der = encode_key(key)?;
    let digest = hash(&[der.as_slice()]);
    let mut id = [0u8; PERMANENT_ID_LENGTH];
    id.copy_from_slice(&digest[..PERMANENT_ID_LENGTH]);
    Ok(id)
}

/// Returns the 24-hour bucket `unix_time` falls into for this service.
///
/// The time is truncated to 32 bits first.
pub fn time_period(permanent_id: &[u8; PERMANENT_ID_LENGTH], unix_time: i64) -> u32 {
    let offset = u32::from(permanent_id[0]) * TIME_PERIOD_LENGTH / 256;
    (unix_time as u32).wrapping_add(offset) / TIME_PERIOD_LENGTH
}

/// Computes the secret id part for a time and replica.
pub fn secret_id(
    permanent_id: &[u8; PERMANENT_ID_LENGTH],
    unix_time: i64,
    replica: u8,
) -> [u8; HASH_LENGTH] {
    let period = time_period(permanent_id, unix_time).to_be_bytes();
    hash(&[&period[..], &[replica][..]])
}

/// Computes the descriptor id from a permanent id and secret id part.
pub fn descriptor_id(
    permanent_id: &[u8; PERMANENT_ID_LENGTH],
    secret_id: &[u8; HASH_LENGTH],
) -> [u8; HASH_LENGTH] {
    hash(&[&permanent_id[..], &secret_id[..]])
}

/// Returns the 16-character onion address of `key`, without the `.onion`
/// suffix.
///
/// # Errors
///
/// Returns [`HiddenServiceDescriptorError::KeyEncoding`] if the key cannot
/// be encoded.
pub fn onion_address(key: &RsaPublicKey) -> Result<String, Error> {
    Ok(base32_encode(&permanent_id(key)?))
}
