//! Signature verification for detached and payload signatures.
//!
//! Verification sits on a trust boundary: "could not confirm" and "confirmed
//! invalid" must be handled identically by callers. Every function here returns
//! `bool`, logs the reason for a rejection, and never panics on hostile input.

use p256::ecdsa::{Signature, VerifyingKey, signature::hazmat::PrehashVerifier};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    jose::{
        JwsAlgorithm, base64_url_decode, base64_url_encode, canonical::canonical_json,
        decode_header, der::raw_to_der, split_compact,
    },
    keys::{Jwk, jwk_to_public_key},
};

/// Verifies a detached signature `b64u(header).[ignored].b64u(signature)` over `body`.
///
/// - `alg` must be `ES256`, `ES384` or `ES512`
/// - the candidate is the key whose `kid` matches the header's `kid`, or the
///   first candidate when the header carries none
/// - the signing input is always rebuilt from `body`; a non-empty middle
///   segment is tolerated and ignored
///
/// # Examples
///
/// ```
/// use ucp_trust::jose::verify_detached;
///
/// // Any non-ECDSA algorithm is rejected regardless of key material.
/// let hs256 = "eyJhbGciOiJIUzI1NiJ9..c2ln";
/// assert!(!verify_detached(hs256, b"{}", &[]));
/// ```
#[must_use]
pub fn verify_detached(signature: &str, body: &[u8], candidates: &[Jwk]) -> bool {
    let Some((header_b64, _, signature_b64)) = split_compact(signature) else {
        debug!("detached signature rejected: not three segments");
        return false;
    };
    let Some(header) = decode_header(header_b64) else {
        debug!("detached signature rejected: unreadable header");
        return false;
    };
    let Some(alg) = JwsAlgorithm::from_name(&header.alg) else {
        warn!(alg = %header.alg, "detached signature rejected: algorithm not allowed");
        return false;
    };

    let candidate = match header.kid.as_deref().filter(|kid| !kid.is_empty()) {
        Some(kid) => candidates.iter().find(|jwk| jwk.kid == kid),
        None => candidates.first(),
    };
    let Some(jwk) = candidate else {
        debug!(kid = ?header.kid, "detached signature rejected: no candidate key");
        return false;
    };

    let signing_input = format!("{header_b64}.{}", base64_url_encode(body));
    verify_with_key(alg, signing_input.as_bytes(), signature_b64, jwk)
}

/// Verifies a payload signature stored inside the payload itself.
///
/// `signature_path` is dot-separated (for example `ap2.merchant_authorization`).
/// Its first segment names the top-level field that was excluded when the
/// payload was signed. Returns `false` if the path does not lead to a string.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use ucp_trust::{
///     jose::{SignatureEngine, verify_payload_signature},
///     keys::{KeyManager, MemoryConfigStore},
/// };
///
/// let engine = SignatureEngine::new(KeyManager::new(MemoryConfigStore::new()));
/// let keys = engine.keys().public_keys("store-1")?;
///
/// let mut checkout = json!({"id": "co_1", "totals": [{"type": "total", "amount": 2500}]});
/// let signature = engine.sign_payload_excluding(&checkout, "ap2", "store-1")?;
/// checkout["ap2"] = json!({"merchant_authorization": signature});
///
/// assert!(verify_payload_signature(&checkout, "ap2.merchant_authorization", &keys));
/// # Ok::<(), ucp_trust::TrustError>(())
/// ```
#[must_use]
pub fn verify_payload_signature(payload: &Value, signature_path: &str, candidates: &[Jwk]) -> bool {
    let Some(excluded) = signature_path.split('.').next().filter(|s| !s.is_empty()) else {
        return false;
    };

    let mut cursor = payload;
    for segment in signature_path.split('.') {
        match cursor.get(segment) {
            Some(next) => cursor = next,
            None => {
                debug!(signature_path, "payload signature rejected: path not found");
                return false;
            }
        }
    }
    let Some(signature) = cursor.as_str() else {
        debug!(signature_path, "payload signature rejected: not a string");
        return false;
    };

    match canonical_json(payload, excluded) {
        Ok(canonical) => verify_detached(signature, canonical.as_bytes(), candidates),
        Err(e) => {
            debug!(error = %e, "payload signature rejected: canonicalization failed");
            false
        }
    }
}

/// Returns `true` if any of `keys` verifies the signature.
pub(crate) fn verify_with_keys(
    alg: JwsAlgorithm,
    signing_input: &[u8],
    signature_b64: &str,
    keys: &[Jwk],
) -> bool {
    keys.iter().any(|jwk| verify_with_key(alg, signing_input, signature_b64, jwk))
}

fn verify_with_key(alg: JwsAlgorithm, signing_input: &[u8], signature_b64: &str, jwk: &Jwk) -> bool {
    let public_key = match jwk_to_public_key(jwk) {
        Ok(key) => key,
        Err(e) => {
            debug!(kid = %jwk.kid, error = %e, "candidate key unusable");
            return false;
        }
    };

    let Some(raw) = base64_url_decode(signature_b64) else {
        debug!("signature segment is not base64url");
        return false;
    };
    if raw.is_empty() || raw.len() % 2 != 0 {
        debug!(len = raw.len(), "signature has odd length");
        return false;
    }
    let Ok(signature) = Signature::from_der(&raw_to_der(&raw)) else {
        debug!(len = raw.len(), "signature does not fit the curve");
        return false;
    };

    let verifying_key = VerifyingKey::from(public_key);
    match verifying_key.verify_prehash(&alg.digest(signing_input), &signature) {
        Ok(()) => {
            debug!(kid = %jwk.kid, alg = alg.as_str(), "signature verified");
            true
        }
        Err(e) => {
            warn!(kid = %jwk.kid, error = %e, "signature verification failed");
            false
        }
    }
}
