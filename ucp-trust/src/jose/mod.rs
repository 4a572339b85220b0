//! Compact JOSE signatures over P-256.
//!
//! Three message shapes share one header layout and one signing path:
//!
//! - **Standard token**: `b64u(header).b64u(claims).b64u(signature)`
//! - **Detached signature**: `b64u(header)..b64u(signature)`, the body travels
//!   out-of-band (RFC 7797 style)
//! - **Payload signature**: a detached signature over the canonical JSON of a
//!   structured payload with one field removed
//!
//! Signatures inside JOSE strings are always the raw `r‖s` form. The ECDSA
//! primitive works with DER, so [`der`] converts in both directions.
//!
//! # Examples
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
//! let signature = engine.build_detached(br#"{"a":1}"#, "store-1")?;
//! assert!(signature.contains(".."));
//! assert!(verify_detached(&signature, br#"{"a":1}"#, &keys));
//! assert!(!verify_detached(&signature, br#"{"a":2}"#, &keys));
//! # Ok::<(), ucp_trust::TrustError>(())
//! ```

pub mod canonical;
pub mod der;
pub mod signer;
pub mod verifier;

#[cfg(test)]
mod tests;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

pub use canonical::canonical_json;
pub use der::{RAW_SIGNATURE_LEN, der_to_raw, raw_to_der};
pub use signer::SignatureEngine;
pub use verifier::{verify_detached, verify_payload_signature};

/// JWS algorithms accepted on the verification side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwsAlgorithm {
    /// ECDSA with SHA-256.
    Es256,
    /// ECDSA with SHA-384.
    Es384,
    /// ECDSA with SHA-512.
    Es512,
}

impl JwsAlgorithm {
    /// Parses a JOSE `alg` header value. Anything outside the ECDSA family is `None`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ES256" => Some(Self::Es256),
            "ES384" => Some(Self::Es384),
            "ES512" => Some(Self::Es512),
            _ => None,
        }
    }

    /// Returns the JOSE `alg` header value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
        }
    }

    /// Hashes the signing input with this algorithm's digest.
    #[must_use]
    pub fn digest(&self, signing_input: &[u8]) -> Vec<u8> {
        match self {
            Self::Es256 => Sha256::digest(signing_input).to_vec(),
            Self::Es384 => Sha384::digest(signing_input).to_vec(),
            Self::Es512 => Sha512::digest(signing_input).to_vec(),
        }
    }
}

/// Protected header shared by tokens and detached signatures.
///
/// Field order is fixed (`alg`, `typ`, `kid`) so headers produced by this crate
/// are byte-stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoseHeader {
    /// Signature algorithm.
    pub alg: String,
    /// Token type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Identifier of the signing key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JoseHeader {
    /// Header used for every signature this crate produces.
    #[must_use]
    pub fn es256(kid: impl Into<String>) -> Self {
        Self {
            alg: JwsAlgorithm::Es256.as_str().to_owned(),
            typ: Some("JWT".to_owned()),
            kid: Some(kid.into()),
        }
    }
}

/// Encodes bytes as base64url (RFC 4648) without padding.
#[must_use]
pub fn base64_url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes unpadded base64url. Returns `None` on any invalid input.
#[must_use]
pub fn base64_url_decode(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(data).ok()
}

/// Splits a compact JOSE string into exactly three segments.
pub(crate) fn split_compact(compact: &str) -> Option<(&str, &str, &str)> {
    let mut parts = compact.split('.');
    let header = parts.next()?;
    let payload = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((header, payload, signature))
}

/// Decodes and parses a base64url-encoded JOSE header.
pub(crate) fn decode_header(segment: &str) -> Option<JoseHeader> {
    let bytes = base64_url_decode(segment)?;
    serde_json::from_slice(&bytes).ok()
}
