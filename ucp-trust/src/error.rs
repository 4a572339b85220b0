//! Error types for UCP trust operations.
//!
//! Key conversion and key management failures are surfaced as [`TrustError`]
//! values. Verification never produces one: every verification entry point
//! returns `bool` or `Option` and fails closed.
//!
//! # Error Categories
//!
//! - **Key material** ([`TrustError::InvalidKey`], [`TrustError::UnsupportedKeyType`],
//!   [`TrustError::UnsupportedCurve`], [`TrustError::MissingCoordinates`],
//!   [`TrustError::InvalidEncoding`]): malformed or unsupported keys
//! - **Signature encoding** ([`TrustError::MalformedDer`]): DER signature parse failures
//! - **Key lifecycle** ([`TrustError::KeyGenerationFailed`], [`TrustError::NoPrivateKey`])
//! - **Ambient** ([`TrustError::StoreError`], [`TrustError::ConfigError`],
//!   [`TrustError::SerializationError`])
//!
//! # Examples
//!
//! ```
//! use ucp_trust::error::{Result, TrustError};
//!
//! fn require_ec(kty: &str) -> Result<()> {
//!     if kty != "EC" {
//!         return Err(TrustError::UnsupportedKeyType(kty.to_owned()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_ec("RSA").is_err());
//! ```

use thiserror::Error;

/// Result type alias for trust operations.
pub type Result<T> = std::result::Result<T, TrustError>;

/// Errors raised by key conversion, key management and signing.
///
/// # Error Recovery
///
/// - **Key material errors**: the JWK or PEM came from a misconfigured peer or a
///   corrupted store entry. Regenerate or re-fetch the key.
/// - **[`NoPrivateKey`](Self::NoPrivateKey)**: call
///   [`KeyManager::generate_and_store`](crate::keys::KeyManager::generate_and_store)
///   for the scope before signing.
/// - **[`StoreError`](Self::StoreError)**: the configuration store is unavailable.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum TrustError {
    /// Public key is not a usable P-256 point.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// JWK `kty` is not `"EC"`.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// JWK `crv` is not `"P-256"`.
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),

    /// JWK is missing its `x` or `y` coordinate.
    #[error("JWK is missing x or y coordinate")]
    MissingCoordinates,

    /// Key material could not be decoded or re-encoded.
    ///
    /// Raised for invalid base64url, oversized coordinates, and when a freshly
    /// built SubjectPublicKeyInfo fails to parse.
    #[error("invalid key encoding: {0}")]
    InvalidEncoding(String),

    /// DER-encoded ECDSA signature is malformed.
    #[error("malformed DER signature: {0}")]
    MalformedDer(String),

    /// Key pair generation or persistence failed.
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// No private key is configured for the scope.
    #[error("no private key configured for scope '{0}'")]
    NoPrivateKey(String),

    /// Configuration store read or write failed.
    #[error("configuration store error: {0}")]
    StoreError(String),

    /// Configuration file is invalid.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
}
