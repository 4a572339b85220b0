//! ES256 signature generation for tokens, detached signatures and payloads.

use p256::ecdsa::{DerSignature, SigningKey, signature::Signer};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    error::{Result, TrustError},
    jose::{
        JoseHeader, JwsAlgorithm, base64_url_decode, base64_url_encode, canonical::canonical_json,
        decode_header, der::der_to_raw, split_compact, verifier::verify_with_keys,
    },
    keys::{ConfigStore, KeyManager},
};

/// Builds and checks compact JOSE signatures for a scope's signing identity.
///
/// The engine holds no state beyond its [`KeyManager`]; everything an
/// operation needs is read from the store on each call.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use ucp_trust::{
///     jose::SignatureEngine,
///     keys::{KeyManager, MemoryConfigStore},
/// };
///
/// let engine = SignatureEngine::new(KeyManager::new(MemoryConfigStore::new()));
/// engine.keys().generate_and_store("store-1")?;
///
/// let token = engine.build_token(&json!({"sub": "agent-7"}), "store-1")?;
/// let claims = engine.verify_token(&token, "store-1").expect("valid token");
/// assert_eq!(claims["sub"], "agent-7");
/// # Ok::<(), ucp_trust::TrustError>(())
/// ```
#[derive(Debug)]
pub struct SignatureEngine<S> {
    keys: KeyManager<S>,
}

impl<S: ConfigStore> SignatureEngine<S> {
    /// Creates an engine over `keys`.
    #[must_use]
    pub const fn new(keys: KeyManager<S>) -> Self {
        Self { keys }
    }

    /// Returns the key manager.
    #[must_use]
    pub const fn keys(&self) -> &KeyManager<S> {
        &self.keys
    }

    /// Builds a standard token `b64u(header).b64u(claims).b64u(signature)`.
    ///
    /// # Errors
    ///
    /// - [`TrustError::NoPrivateKey`] if the scope has no signing key
    /// - [`TrustError::SerializationError`] if `claims` cannot be serialized
    #[instrument(skip(self, claims))]
    pub fn build_token<C: Serialize + ?Sized>(&self, claims: &C, scope: &str) -> Result<String> {
        let payload = serde_json::to_vec(claims)?;
        let (header_b64, signature_b64) = self.sign_compact(&payload, scope)?;
        Ok(format!("{header_b64}.{}.{signature_b64}", base64_url_encode(&payload)))
    }

    /// Verifies a standard token against every public key on record for `scope`.
    ///
    /// Returns the decoded claims, or `None` for any malformed segment, an `alg`
    /// other than `ES256`, or a signature no key accepts. May generate the
    /// scope's key pair as a side effect of listing its public keys.
    #[instrument(skip(self, token))]
    pub fn verify_token(&self, token: &str, scope: &str) -> Option<Value> {
        let (header_b64, payload_b64, signature_b64) = split_compact(token)?;
        let header = decode_header(header_b64)?;
        if header.alg != JwsAlgorithm::Es256.as_str() {
            debug!(alg = %header.alg, "token rejected: algorithm");
            return None;
        }

        let payload = base64_url_decode(payload_b64)?;
        let claims: Value = serde_json::from_slice(&payload).ok()?;

        let keys = match self.keys.public_keys(scope) {
            Ok(keys) => keys,
            Err(e) => {
                debug!(error = %e, "token rejected: no public keys");
                return None;
            }
        };

        let signing_input = format!("{header_b64}.{payload_b64}");
        verify_with_keys(JwsAlgorithm::Es256, signing_input.as_bytes(), signature_b64, &keys)
            .then_some(claims)
    }

    /// Builds a detached signature `b64u(header)..b64u(signature)` over `body`.
    ///
    /// The signing input is `b64u(header).b64u(body)`; the body itself is left
    /// out of the output.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::NoPrivateKey`] if the scope has no signing key.
    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub fn build_detached(&self, body: &[u8], scope: &str) -> Result<String> {
        let (header_b64, signature_b64) = self.sign_compact(body, scope)?;
        Ok(format!("{header_b64}..{signature_b64}"))
    }

    /// Signs the canonical JSON of `payload` without its `excluded_field`.
    ///
    /// Used for merchant authorizations, where the signature is later stored
    /// inside the excluded field.
    ///
    /// # Errors
    ///
    /// Same as [`build_detached`](Self::build_detached).
    pub fn sign_payload_excluding(
        &self,
        payload: &Value,
        excluded_field: &str,
        scope: &str,
    ) -> Result<String> {
        let canonical = canonical_json(payload, excluded_field)?;
        self.build_detached(canonical.as_bytes(), scope)
    }

    /// Signs `b64u(header).b64u(payload)` and returns the header and raw
    /// signature segments.
    fn sign_compact(&self, payload: &[u8], scope: &str) -> Result<(String, String)> {
        let signing_key =
            self.keys.private_key(scope)?.ok_or_else(|| TrustError::NoPrivateKey(scope.to_owned()))?;

        let header = JoseHeader::es256(self.keys.key_id(scope)?);
        let header_b64 = base64_url_encode(&serde_json::to_vec(&header)?);
        let signing_input = format!("{header_b64}.{}", base64_url_encode(payload));

        let raw = sign_raw(&signing_key, signing_input.as_bytes())?;
        debug!(kid = ?header.kid, "signed compact JOSE input");
        Ok((header_b64, base64_url_encode(&raw)))
    }
}

/// Signs with ES256 and returns the 64-byte `r‖s` signature.
///
/// The primitive emits DER; JOSE needs raw.
fn sign_raw(signing_key: &SigningKey, message: &[u8]) -> Result<[u8; 64]> {
    let der: DerSignature = signing_key.sign(message);
    der_to_raw(der.as_bytes())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{jose::verify_detached, keys::MemoryConfigStore};

    fn engine() -> SignatureEngine<MemoryConfigStore> {
        let engine = SignatureEngine::new(KeyManager::new(MemoryConfigStore::new()));
        engine.keys().generate_and_store("s").unwrap();
        engine
    }

    fn header_of(compact: &str) -> Value {
        let segment = compact.split('.').next().unwrap();
        serde_json::from_slice(&base64_url_decode(segment).unwrap()).unwrap()
    }

    #[test]
    fn test_token_format() {
        let engine = engine();
        let token = engine.build_token(&json!({"iss": "shop"}), "s").unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| !p.is_empty()));
        assert!(!token.contains('='));
        assert_eq!(base64_url_decode(parts[2]).unwrap().len(), 64);

        let header = header_of(&token);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["typ"], "JWT");
        assert_eq!(header["kid"], engine.keys().key_id("s").unwrap());
    }

    #[test]
    fn test_token_roundtrip() {
        let engine = engine();
        let claims = json!({"sub": "agent", "n": 5, "nested": {"a": [1, 2]}});
        let token = engine.build_token(&claims, "s").unwrap();
        assert_eq!(engine.verify_token(&token, "s"), Some(claims));
    }

    #[test]
    fn test_token_without_private_key() {
        let engine = SignatureEngine::new(KeyManager::new(MemoryConfigStore::new()));
        let result = engine.build_token(&json!({}), "missing");
        assert!(matches!(result, Err(TrustError::NoPrivateKey(scope)) if scope == "missing"));
    }

    #[test]
    fn test_token_tampered_claims_rejected() {
        let engine = engine();
        let token = engine.build_token(&json!({"amount": 1}), "s").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = base64_url_encode(br#"{"amount":1000}"#);
        let tampered = format!("{}.{forged}.{}", parts[0], parts[2]);
        assert_eq!(engine.verify_token(&tampered, "s"), None);
    }

    #[test]
    fn test_token_from_other_scope_rejected() {
        let engine = engine();
        engine.keys().generate_and_store("other").unwrap();
        let token = engine.build_token(&json!({"a": 1}), "other").unwrap();
        assert_eq!(engine.verify_token(&token, "s"), None);
    }

    #[test]
    fn test_token_malformed_inputs() {
        let engine = engine();
        let token = engine.build_token(&json!({"a": 1}), "s").unwrap();

        let extra = format!("{token}.extra");
        for bad in ["", "a.b", "a.b.c.d", "!!.!!.!!", extra.as_str()] {
            assert_eq!(engine.verify_token(bad, "s"), None, "input {bad:?}");
        }
    }

    #[test]
    fn test_token_wrong_alg_rejected() {
        let engine = engine();
        let token = engine.build_token(&json!({"a": 1}), "s").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let header = base64_url_encode(br#"{"alg":"ES384","typ":"JWT"}"#);
        let relabelled = format!("{header}.{}.{}", parts[1], parts[2]);
        assert_eq!(engine.verify_token(&relabelled, "s"), None);
    }

    #[test]
    fn test_detached_shape() {
        let engine = engine();
        let signature = engine.build_detached(b"body", "s").unwrap();

        let parts: Vec<&str> = signature.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].is_empty(), "payload segment must be empty");
        assert_eq!(header_of(&signature)["kid"], engine.keys().key_id("s").unwrap());
    }

    #[test]
    fn test_detached_roundtrip() {
        let engine = engine();
        let keys = engine.keys().public_keys("s").unwrap();
        let signature = engine.build_detached(b"hello", "s").unwrap();

        assert!(verify_detached(&signature, b"hello", &keys));
        assert!(!verify_detached(&signature, b"hellp", &keys));
    }

    #[test]
    fn test_payload_signature_ignores_excluded_field_and_key_order() {
        let engine = engine();
        let keys = engine.keys().public_keys("s").unwrap();

        let payload = json!({"id": "co_1", "total": 500, "ap2": {"merchant_authorization": "x"}});
        let signature = engine.sign_payload_excluding(&payload, "ap2", "s").unwrap();

        let canonical = canonical_json(&json!({"total": 500, "id": "co_1"}), "ap2").unwrap();
        assert!(verify_detached(&signature, canonical.as_bytes(), &keys));
    }
}
