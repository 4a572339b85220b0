//! Signing identities: key format conversion, storage and lifecycle.
//!
//! - [`codec`]: P-256 public key ⇄ DER SubjectPublicKeyInfo / PEM ⇄ JWK
//! - [`store`]: the scoped [`ConfigStore`] contract and two implementations
//! - [`manager`]: [`KeyManager`], which generates and reads a scope's key pair
//!
//! Signing identities are P-256 (ES256). Public keys are published to third
//! parties as JWKs; private keys never leave the store except as a
//! [`SigningKey`](p256::ecdsa::SigningKey) handed to the signer.

pub mod codec;
pub mod manager;
pub mod store;

pub use codec::{
    Jwk, Jwks, jwk_to_pem, jwk_to_public_key, jwk_to_spki_der, public_key_from_pem,
    public_key_pem_to_jwk, public_key_to_jwk, public_key_to_pem,
};
pub use manager::{DEFAULT_KEY_ID_PREFIX, KeyField, KeyManager};
pub use p256::{PublicKey, ecdsa::SigningKey};
pub use store::{ConfigStore, FileConfigStore, MemoryConfigStore};
