//! Detached and payload signature example.
//!
//! A business signs a request body and a checkout payload; a platform verifies
//! both against the published keys.

#![allow(clippy::print_stdout, reason = "examples need output")]

use serde_json::json;
use ucp_trust::{
    jose::{SignatureEngine, verify_detached, verify_payload_signature},
    keys::{KeyManager, MemoryConfigStore},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("UCP Trust: Detached Signature Example\n");

    let engine = SignatureEngine::new(KeyManager::new(MemoryConfigStore::new()));
    let published = engine.keys().public_keys("store-1")?;

    // Detached signature over a raw body, sent in a request header
    let body = br#"{"line_items":[{"item":{"id":"sku_1"},"quantity":2}]}"#;
    let signature = engine.build_detached(body, "store-1")?;
    println!("Request-Signature: {signature}");
    println!("verified: {}", verify_detached(&signature, body, &published));

    // Payload signature stored inside the payload
    let mut checkout = json!({
        "id": "co_42",
        "currency": "EUR",
        "totals": [{"type": "total", "amount": 4200}],
    });
    let authorization = engine.sign_payload_excluding(&checkout, "ap2", "store-1")?;
    checkout["ap2"] = json!({ "merchant_authorization": authorization });

    println!("\n{}", serde_json::to_string_pretty(&checkout)?);
    println!(
        "merchant_authorization verified: {}",
        verify_payload_signature(&checkout, "ap2.merchant_authorization", &published)
    );

    Ok(())
}
