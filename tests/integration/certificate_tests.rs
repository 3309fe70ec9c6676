//! Tests for certificate decoding through the public API.

use chrono::{Duration, Utc};
use onion_desc::datatype::CertType;
use onion_desc::descriptor::{CERTIFICATE_SIGNATURE_LENGTH, CERTIFIED_KEY_LENGTH};
use onion_desc::{Certificate, ErrorKind, Extension};

const SERVER_SIGNING_CERT: &str = "-----BEGIN ED25519 CERT-----
AQQABhtZAaW2GoBED1IjY3A6f6GNqBEl5A83fD2Za9upGke51JGqAQAgBABnprVR
ptIr43bWPo2fIzo3uOywfoMrryprpbm4HhCkZMaO064LP+1KNuLvlc8sGG8lTjx1
g4k3ELuWYgHYWU5rAia7nl4gUfBZOEfHAfKES7l3d63dBEjEX98Ljhdp2w4=
-----END ED25519 CERT-----";

fn fresh_certificate() -> Certificate {
    let expiration = Utc::now() + Duration::days(2);
    let hours = expiration.timestamp() / 3600;
    Certificate {
        version: 1,
        cert_type: 8,
        expiration: chrono::DateTime::from_timestamp(hours * 3600, 0).unwrap(),
        key_type: 1,
        certified_key: [7; CERTIFIED_KEY_LENGTH],
        extensions: [(
            4,
            Extension {
                ext_type: 4,
                flags: 0,
                data: vec![9; 32],
            },
        )]
        .into_iter()
        .collect(),
        signature: [1; CERTIFICATE_SIGNATURE_LENGTH],
    }
}

#[test]
fn test_server_signing_certificate() {
    let cert = Certificate::from_base64(SERVER_SIGNING_CERT).unwrap();

    assert_eq!(cert.cert_type(), CertType::Ed25519Signing);
    assert!(cert.is_expired());
    assert_eq!(cert.signing_key().unwrap().len(), 32);
    assert_eq!(cert.to_base64_pem().unwrap().trim_end(), SERVER_SIGNING_CERT);
}

#[test]
fn test_fresh_certificate_round_trip() {
    let cert = fresh_certificate();
    assert!(!cert.is_expired());
    assert_eq!(cert.cert_type(), CertType::HsDescSigning);

    let decoded = Certificate::from_base64(&cert.to_base64().unwrap()).unwrap();
    assert_eq!(decoded, cert);
    assert_eq!(decoded.signing_key(), Some(&[9u8; 32][..]));
}

#[test]
fn test_every_truncation_is_an_error() {
    let packed = fresh_certificate().pack().unwrap();

    for len in 0..packed.len() {
        let err = Certificate::unpack(&packed[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec, "length {}", len);
    }
    assert!(Certificate::unpack(&packed).is_ok());
}

#[test]
fn test_unknown_cert_type_is_preserved() {
    let mut cert = fresh_certificate();
    cert.cert_type = 200;

    let decoded = Certificate::unpack(&cert.pack().unwrap()).unwrap();
    assert_eq!(decoded.cert_type, 200);
    assert_eq!(decoded.cert_type(), CertType::Unknown);
}

#[test]
fn test_unencodable_certificate_is_reported() {
    let mut cert = fresh_certificate();
    cert.extensions.get_mut(&4).unwrap().data = vec![0; 100_000];

    let err = onion_desc::Error::from(cert.pack().unwrap_err());
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(cert.to_base64_pem().is_err());
}
