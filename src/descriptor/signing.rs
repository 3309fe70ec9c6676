//! Signing and verification of onion service descriptors.
//!
//! The signed digest is the SHA-1 of the canonical descriptor text up to and
//! including the bare `signature` line, which is exactly what
//! [`OnionDescriptor::to_bytes`] produces while the descriptor is unsigned.
//!
//! Tor signs that digest with raw PKCS#1 v1.5 padding: the 20 digest bytes
//! are padded directly, without the ASN.1 `DigestInfo` prefix that
//! [RFC 8017](https://www.rfc-editor.org/rfc/rfc8017#section-9.2) adds.
//! Verification here uses [`Pkcs1v15Sign::new_unprefixed`] to match, so
//! signatures from real services check out.
//!
//! Signing itself is delegated to a callback so keys can live wherever the
//! caller keeps them. [`rsa_signer`] builds one from an in-memory
//! [`RsaPrivateKey`].
//!
//! # Example
//!
//! ```rust,no_run
//! use onion_desc::descriptor::signing::rsa_signer;
//! use onion_desc::OnionDescriptor;
//! use rsa::RsaPrivateKey;
//!
//! # fn example(private_key: RsaPrivateKey) -> Result<(), onion_desc::Error> {
//! let mut descriptor = OnionDescriptor::new(private_key.to_public_key());
//! descriptor.update(0)?;
//! descriptor.sign(rsa_signer(&private_key))?;
//! descriptor.verify_signature()?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;

use rsa::{Pkcs1v15Sign, RsaPrivateKey};

use super::hidden::OnionDescriptor;
use super::{HiddenServiceDescriptorError, SignatureError};
use crate::util::{hash, HASH_LENGTH};
use crate::Error;

/// SHA-1 of the descriptor's canonical bytes with the signature left out.
///
/// # Errors
///
/// Returns [`HiddenServiceDescriptorError::KeyEncoding`] if the permanent
/// key cannot be DER-encoded.
pub fn signable_digest(descriptor: &OnionDescriptor) -> Result<[u8; HASH_LENGTH], Error> {
    let signable = descriptor.render(&[])?;
    Ok(hash(&[signable.as_bytes()]))
}

/// Signs `descriptor` by passing its digest to `sign_fn` and storing the
/// result.
///
/// Any previous signature is discarded first, so the descriptor is left
/// unsigned if `sign_fn` fails.
///
/// # Errors
///
/// - [`SignatureError::SigningFailed`] if `sign_fn` fails or returns no bytes
/// - [`HiddenServiceDescriptorError::KeyEncoding`] if the permanent key
///   cannot be DER-encoded
pub fn sign<F, E>(descriptor: &mut OnionDescriptor, sign_fn: F) -> Result<(), Error>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>, E>,
    E: Display,
{
    let digest = signable_digest(descriptor)?;
    descriptor.signature.clear();

    let signature = sign_fn(&digest).map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    if signature.is_empty() {
        return Err(SignatureError::SigningFailed("signer returned no bytes".into()).into());
    }

    descriptor.signature = signature;
    Ok(())
}

/// Checks the stored signature against the permanent key.
///
/// # Errors
///
/// - [`HiddenServiceDescriptorError::EmptySignature`] if the descriptor is
///   unsigned
/// - [`SignatureError::SignatureMismatch`] if the signature does not match
pub fn verify_signature(descriptor: &OnionDescriptor) -> Result<(), Error> {
    if descriptor.signature.is_empty() {
        return Err(HiddenServiceDescriptorError::EmptySignature.into());
    }

    let digest = signable_digest(descriptor)?;
    descriptor
        .permanent_key
        .verify(Pkcs1v15Sign::new_unprefixed(), &digest, &descriptor.signature)
        .map_err(|e| SignatureError::SignatureMismatch(e.to_string()))?;
    Ok(())
}

/// Returns a signing callback producing Tor-style raw PKCS#1 v1.5
/// signatures with `private_key`.
pub fn rsa_signer(
    private_key: &RsaPrivateKey,
) -> impl Fn(&[u8]) -> Result<Vec<u8>, rsa::Error> + '_ {
    move |digest: &[u8]| private_key.sign(Pkcs1v15Sign::new_unprefixed(), digest)
}

impl OnionDescriptor {
    /// See [`signable_digest`].
    pub fn signable_digest(&self) -> Result<[u8; HASH_LENGTH], Error> {
        signable_digest(self)
    }

    /// See [`sign`].
    pub fn sign<F, E>(&mut self, sign_fn: F) -> Result<(), Error>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, E>,
        E: Display,
    {
        sign(self, sign_fn)
    }

    /// See [`verify_signature`].
    pub fn verify_signature(&self) -> Result<(), Error> {
        verify_signature(self)
    }
}
