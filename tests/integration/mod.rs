//! Integration tests for onion-desc against recorded Tor data.

mod certificate_tests;
mod descriptor_tests;

use std::path::PathBuf;

use onion_desc::descriptor::strip_type_annotation;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::RsaPrivateKey;

pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn read_data(name: &str) -> Vec<u8> {
    std::fs::read(data_path(name)).expect("test data is readable")
}

/// The DuckDuckGo descriptor without its `@type` annotation.
pub fn duckduckgo_body() -> String {
    let content = read_data("duckduckgo.txt");
    let (_, body) = strip_type_annotation(&content);
    String::from_utf8(body.to_vec()).expect("descriptor is UTF-8")
}

pub fn test_private_key() -> RsaPrivateKey {
    let pem = std::fs::read_to_string(data_path("test_key.pem")).expect("key is readable");
    RsaPrivateKey::from_pkcs1_pem(&pem).expect("key is valid PKCS#1")
}

#[test]
fn test_data_is_present() {
    assert!(data_path("duckduckgo.txt").exists());
    assert!(data_path("test_key.pem").exists());
}
