use proptest::prelude::*;
use serde_json::{Map, Value};

use crate::{
    jose::{
        SignatureEngine, base64_url_encode, canonical_json, der_to_raw, raw_to_der,
        verify_detached, verify_payload_signature,
    },
    keys::{KeyManager, MemoryConfigStore},
};

fn engine() -> SignatureEngine<MemoryConfigStore> {
    SignatureEngine::new(KeyManager::new(MemoryConfigStore::new()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_der_raw_roundtrip(raw in any::<[u8; 64]>()) {
        let der = raw_to_der(&raw);
        prop_assert_eq!(der[0], 0x30);
        prop_assert_eq!(der_to_raw(&der).expect("own encoding must parse"), raw);
    }

    #[test]
    fn test_der_to_raw_never_panics(bytes in any::<Vec<u8>>()) {
        let _ = der_to_raw(&bytes);
    }

    #[test]
    fn test_verify_detached_never_panics(
        header in any::<Vec<u8>>(),
        signature in any::<Vec<u8>>(),
        body in any::<Vec<u8>>(),
    ) {
        let compact = format!("{}..{}", base64_url_encode(&header), base64_url_encode(&signature));
        let keys = engine().keys().public_keys("s").expect("key generation");
        prop_assert!(!verify_detached(&compact, &body, &keys));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_detached_signature_roundtrip(body in any::<Vec<u8>>()) {
        let engine = engine();
        let keys = engine.keys().public_keys("s").expect("key generation");
        let signature = engine.build_detached(&body, "s").expect("signing");

        prop_assert!(verify_detached(&signature, &body, &keys));
    }

    #[test]
    fn test_detached_signature_detects_body_change(
        body in proptest::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let engine = engine();
        let keys = engine.keys().public_keys("s").expect("key generation");
        let signature = engine.build_detached(&body, "s").expect("signing");

        let mut tampered = body.clone();
        tampered[index.index(body.len())] ^= flip;
        prop_assert!(!verify_detached(&signature, &tampered, &keys));
    }

    #[test]
    fn test_payload_signature_roundtrip(
        fields in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8),
    ) {
        let engine = engine();
        let keys = engine.keys().public_keys("s").expect("key generation");

        let mut payload: Map<String, Value> =
            fields.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
        payload.remove("sig");
        let mut payload = Value::Object(payload);

        let signature = engine.sign_payload_excluding(&payload, "sig", "s").expect("signing");
        payload["sig"] = Value::String(signature);

        prop_assert!(verify_payload_signature(&payload, "sig", &keys));
        let canonical = canonical_json(&payload, "sig").expect("canonical form");
        prop_assert!(!canonical.contains("\"sig\""));
    }
}
