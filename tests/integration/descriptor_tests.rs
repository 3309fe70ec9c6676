//! End-to-end tests for building, signing and parsing onion service descriptors.

use chrono::{TimeZone, Utc};
use onion_desc::descriptor::hidden::parse_descriptors;
use onion_desc::descriptor::identifier::{descriptor_id, permanent_id, secret_id};
use onion_desc::descriptor::signing::rsa_signer;
use onion_desc::descriptor::{parse_file, DescriptorParamsBuilder};
use onion_desc::util::base32_encode;
use onion_desc::{ErrorKind, OnionDescriptor};

use crate::{duckduckgo_body, read_data, test_private_key};

#[test]
fn test_duckduckgo_known_answer() {
    let parsed = parse_file(&read_data("duckduckgo.txt")).unwrap();
    assert_eq!(parsed.descriptors.len(), 1);
    assert!(parsed.skipped.is_empty());

    let desc = &parsed.descriptors[0];
    assert_eq!(desc.onion_address().unwrap(), "3g2upl4pq6kufc4m");
    assert_eq!(desc.descriptor_id_base32(), "y3olqqblqw2gbh6phimfuiroechjjafa");
    desc.verify_signature().unwrap();

    let mut rebuilt = OnionDescriptor::new(desc.permanent_key.clone());
    rebuilt.introduction_points = desc.introduction_points.clone();
    rebuilt
        .update_at(0, Utc.with_ymd_and_hms(2015, 2, 23, 20, 59, 59).unwrap())
        .unwrap();
    rebuilt.signature = desc.signature.clone();

    assert_eq!(&rebuilt, desc);
    assert_eq!(String::from_utf8(rebuilt.to_bytes().unwrap()).unwrap(), duckduckgo_body());
    rebuilt.verify_signature().unwrap();
}

#[test]
fn test_build_sign_publish_parse() {
    let key = test_private_key();
    let now = Utc.with_ymd_and_hms(2024, 11, 5, 9, 15, 30).unwrap();

    let mut batch = Vec::new();
    for replica in 0..=1 {
        let mut desc = OnionDescriptor::new(key.to_public_key());
        desc.introduction_points = format!("introduction-point replica{}\n", replica).into_bytes();
        desc.update_at(replica, now).unwrap();
        desc.sign(rsa_signer(&key)).unwrap();
        batch.extend(desc.to_bytes().unwrap());
    }

    let parsed = parse_descriptors(&batch);
    assert_eq!(parsed.descriptors.len(), 2);
    assert!(parsed.skipped.is_empty());
    assert!(parsed.remainder.is_empty());

    let first = &parsed.descriptors[0];
    let second = &parsed.descriptors[1];
    assert_ne!(first.descriptor_id, second.descriptor_id);
    assert_eq!(first.onion_address().unwrap(), second.onion_address().unwrap());
    assert_eq!(first.onion_address().unwrap().len(), 16);

    for desc in &parsed.descriptors {
        desc.verify_signature().unwrap();
        assert_eq!(
            desc.publication_time,
            Utc.with_ymd_and_hms(2024, 11, 5, 9, 0, 0).unwrap()
        );
    }
}

#[test]
fn test_identifier_invariants_hold_after_update() {
    let key = test_private_key().to_public_key();
    let now = Utc.with_ymd_and_hms(2021, 7, 14, 23, 59, 59).unwrap();

    for replica in 0..=1u8 {
        let mut desc = OnionDescriptor::new(key.clone());
        desc.update_at(i32::from(replica), now).unwrap();

        let perm = permanent_id(&key).unwrap();
        let secret = secret_id(&perm, desc.publication_time.timestamp(), replica);
        assert_eq!(desc.secret_id_part, secret);
        assert_eq!(desc.descriptor_id, descriptor_id(&perm, &secret));
        assert_eq!(
            base32_encode(&perm),
            desc.onion_address().unwrap(),
        );
    }
}

#[test]
fn test_replica_bounds() {
    let key = test_private_key().to_public_key();
    let mut desc = OnionDescriptor::new(key);
    let before = desc.clone();

    for replica in [-1, 2, 100] {
        let err = desc.update(replica).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(desc, before);
    }

    let params = DescriptorParamsBuilder::default()
        .max_replica(2u8)
        .build()
        .unwrap();
    desc.update_with(&params, 2, Utc::now()).unwrap();
}

#[test]
fn test_batch_with_bad_records() {
    let key = test_private_key();
    let mut signed = OnionDescriptor::new(key.to_public_key());
    signed.update(0).unwrap();
    signed.sign(rsa_signer(&key)).unwrap();

    let mut unsigned = signed.clone();
    unsigned.signature.clear();

    let blob = format!(
        "{}{}{}garbage line\n",
        signed,
        unsigned,
        duckduckgo_body().replace("version 2", "version ii"),
    );
    let parsed = parse_descriptors(blob.as_bytes());

    assert_eq!(parsed.descriptors.len(), 1);
    assert_eq!(parsed.descriptors[0], signed);

    let skipped: Vec<(usize, ErrorKind)> = parsed
        .skipped
        .iter()
        .map(|(index, err)| (*index, err.kind()))
        .collect();
    assert_eq!(
        skipped,
        vec![
            (1, ErrorKind::MalformedRecord),
            (2, ErrorKind::Validation),
            (3, ErrorKind::MalformedRecord),
        ]
    );
}

fn signed_replicas() -> (OnionDescriptor, OnionDescriptor) {
    let key = test_private_key();
    let now = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
    let mut replicas = (0..=1).map(|replica| {
        let mut desc = OnionDescriptor::new(key.to_public_key());
        desc.update_at(replica, now).unwrap();
        desc.sign(rsa_signer(&key)).unwrap();
        desc
    });
    (replicas.next().unwrap(), replicas.next().unwrap())
}

#[test]
fn test_headless_record_does_not_absorb_next_descriptor() {
    let (first, second) = signed_replicas();
    let first_text = first.to_string();
    let headless = &first_text[first_text.find('\n').unwrap() + 1..];
    let blob = format!("{}{}", headless, second);

    let parsed = parse_descriptors(blob.as_bytes());
    assert_eq!(parsed.descriptors, vec![second]);
    assert_eq!(parsed.skipped.len(), 1);
    assert_eq!(parsed.skipped[0].0, 0);
    assert_eq!(parsed.skipped[0].1.kind(), ErrorKind::MalformedRecord);
    parsed.descriptors[0].verify_signature().unwrap();
}

#[test]
fn test_leading_router_record_keeps_batch() {
    let (first, second) = signed_replicas();
    let blob = format!("router foo 10.0.0.1 9001 0 0\n{}{}", first, second);

    let parsed = parse_descriptors(blob.as_bytes());
    assert_eq!(parsed.descriptors, vec![first, second]);
    assert_eq!(parsed.skipped.len(), 1);
    assert_eq!(parsed.skipped[0].0, 0);
}

#[test]
fn test_batch_record_missing_signature_line() {
    let (first, second) = signed_replicas();
    let mut unsigned = first.clone();
    unsigned.signature.clear();
    let unsigned_text = unsigned.to_string();
    let without_line = unsigned_text.strip_suffix("signature\n").unwrap();
    let blob = format!("{}{}{}", first, without_line, second);

    let parsed = parse_descriptors(blob.as_bytes());
    assert_eq!(parsed.descriptors, vec![first, second]);
    assert_eq!(parsed.skipped.len(), 1);
    assert_eq!(parsed.skipped[0].0, 1);
    assert_eq!(parsed.skipped[0].1.kind(), ErrorKind::MalformedRecord);
}

#[test]
fn test_signature_from_other_key_is_rejected() {
    let key = test_private_key();
    let mut desc = OnionDescriptor::parse(&duckduckgo_body()).unwrap();
    desc.sign(rsa_signer(&key)).unwrap();

    let err = desc.verify_signature().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Signature);
}

#[cfg(feature = "compression")]
#[test]
fn test_gzip_batch_parses_like_plaintext() {
    use flate2::write::GzEncoder;
    use std::io::Write;

    let plain = read_data("duckduckgo.txt");
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&plain).unwrap();
    let compressed = encoder.finish().unwrap();

    let from_gzip = parse_file(&compressed).unwrap();
    let from_plain = parse_file(&plain).unwrap();
    assert_eq!(from_gzip.descriptors, from_plain.descriptors);
    assert_eq!(from_gzip.descriptors.len(), 1);
}
