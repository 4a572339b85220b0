//! JWKS generation example.
//!
//! Generates (or loads) a scope's signing key from a TOML key store and prints
//! the JWK Set a business publishes in its profile.

#![allow(clippy::print_stdout, reason = "examples need output")]

use ucp_trust::keys::{FileConfigStore, KeyManager};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("UCP Trust: JWKS Generation Example\n");

    let dir = tempfile::tempdir()?;
    let store = FileConfigStore::open(dir.path().join("keys.toml"));
    let manager = KeyManager::new(store);

    // First access generates and persists the key pair
    let jwks = manager.jwks("store-1")?;
    let json = jwks.to_json()?;

    println!("signing_keys for the business profile:");
    println!("{json}");

    for key in &jwks.keys {
        if let Some(thumbprint) = key.thumbprint() {
            println!("\nkid {} has RFC 7638 thumbprint {thumbprint}", key.kid);
        }
    }

    println!("\nKey store written to {}", manager.store().path().display());
    Ok(())
}
