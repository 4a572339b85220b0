//! UCP Trust: signing identities, JOSE signatures and capability negotiation
//! for agentic commerce.
//!
//! Platforms and businesses speaking the Universal Commerce Protocol publish
//! P-256 public keys as JWKs, sign the messages they exchange, and agree on
//! which optional protocol features apply to a session. This crate covers
//! that trust layer without any transport.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌─────────────────────┐
//! │ SignatureEngine  │   │ capability::        │
//! │ (jose)           │   │ negotiate           │
//! └───────┬──────────┘   └─────────────────────┘
//!         │
//! ┌───────▼──────────┐   ┌─────────────────────┐
//! │ KeyManager       │──▶│ ConfigStore (trait) │  memory / TOML file
//! │ (keys)           │   └─────────────────────┘
//! └───────┬──────────┘
//!         │
//! ┌───────▼──────────┐
//! │ codec: PEM ⇄ JWK │   der: raw r‖s ⇄ DER
//! └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. Publish a JWK Set
//!
//! ```
//! use ucp_trust::keys::{KeyManager, MemoryConfigStore};
//!
//! let manager = KeyManager::new(MemoryConfigStore::new());
//! let jwks = manager.jwks("store-1")?;
//! println!("{}", jwks.to_json()?);
//! # Ok::<(), ucp_trust::TrustError>(())
//! ```
//!
//! ## 2. Sign and Verify a Request Body
//!
//! ```
//! use ucp_trust::{
//!     jose::{SignatureEngine, verify_detached},
//!     keys::{KeyManager, MemoryConfigStore},
//! };
//!
//! let engine = SignatureEngine::new(KeyManager::new(MemoryConfigStore::new()));
//! let keys = engine.keys().public_keys("store-1")?;
//!
//! let body = br#"{"line_items":[{"id":"sku_1","quantity":1}]}"#;
//! let signature = engine.build_detached(body, "store-1")?;
//! assert!(verify_detached(&signature, body, &keys));
//! # Ok::<(), ucp_trust::TrustError>(())
//! ```
//!
//! ## 3. Negotiate Capabilities
//!
//! ```
//! use ucp_trust::capability::{Capability, negotiate};
//!
//! let platform = vec![Capability::new("dev.ucp.shopping.checkout", "2026-01-11")];
//! let business = vec![Capability::new("dev.ucp.shopping.checkout", "2026-01-11")];
//! assert_eq!(negotiate(&platform, &business).len(), 1);
//! ```
//!
//! # Module Organization
//!
//! - [`keys`]: key format conversion, scoped storage, key lifecycle
//! - [`jose`]: compact JOSE tokens, detached and payload signatures
//! - [`capability`]: version compatibility and capability negotiation
//! - [`profile`]: published profiles and a cached profile fetcher
//! - [`config`]: TOML runtime configuration
//! - [`error`]: error types
//!
//! # Security Considerations
//!
//! - Verification functions return `bool`/`Option` and never panic on hostile input
//! - Only `ES256`, `ES384` and `ES512` are accepted; `none` and HMAC algorithms are rejected
//! - Private keys stay in the [`keys::ConfigStore`]; only JWKs are meant to be published
//! - Profile URLs must be HTTPS and must not point at loopback hosts
//!
//! # Error Handling
//!
//! Fallible operations return [`Result<T>`] with [`TrustError`]. Verification
//! collapses every failure into a negative answer and logs the reason with
//! `tracing`.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod capability;
pub mod config;
pub mod error;
pub mod jose;
pub mod keys;
pub mod profile;

pub use error::{Result, TrustError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = std::marker::PhantomData::<TrustError>;
        let _ = std::marker::PhantomData::<jose::SignatureEngine<keys::MemoryConfigStore>>;
    }
}
