//! Command implementations.
//!
//! Each command returns the text to print so it can be tested without a
//! terminal. Verification failures are errors, which gives a non-zero exit.

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::info;
use ucp_trust::{
    capability::{Capability, negotiate},
    jose::{SignatureEngine, verify_detached, verify_payload_signature},
    keys::{
        ConfigStore, DEFAULT_KEY_ID_PREFIX, Jwk, Jwks, KeyManager, PublicKey, public_key_to_jwk,
    },
    profile::Profile,
};

use crate::observability::{HealthCheck, HealthReport};

/// Body signed by the `doctor` self test.
const SELF_TEST_BODY: &[u8] = b"ucp-trust doctor";

/// Signing operations bound to one scope.
#[derive(Debug)]
pub struct Session<S> {
    engine: SignatureEngine<S>,
    scope: String,
}

impl<S: ConfigStore> Session<S> {
    pub fn new(store: S, scope: impl Into<String>) -> Self {
        Self { engine: SignatureEngine::new(KeyManager::new(store)), scope: scope.into() }
    }

    fn keys(&self) -> &KeyManager<S> {
        self.engine.keys()
    }

    /// Generates a new key pair and returns the resulting JWK Set.
    pub fn keygen(&self) -> Result<String> {
        self.keys()
            .generate_and_store(&self.scope)
            .with_context(|| format!("failed to generate key for scope '{}'", self.scope))?;
        info!(scope = %self.scope, "key rotated");
        self.jwks()
    }

    /// Returns the scope's JWK Set, generating a key pair on first use.
    pub fn jwks(&self) -> Result<String> {
        let jwks = self.keys().jwks(&self.scope)?;
        Ok(jwks.to_json()?)
    }

    pub fn sign_token(&self, claims: &str) -> Result<String> {
        let claims: Value = serde_json::from_str(claims).context("claims must be JSON")?;
        Ok(self.engine.build_token(&claims, &self.scope)?)
    }

    /// Returns the verified claims as pretty JSON.
    pub fn verify_token(&self, token: &str) -> Result<String> {
        match self.engine.verify_token(token.trim(), &self.scope) {
            Some(claims) => Ok(serde_json::to_string_pretty(&claims)?),
            None => bail!("token verification failed"),
        }
    }

    pub fn sign_detached(&self, body: &[u8]) -> Result<String> {
        Ok(self.engine.build_detached(body, &self.scope)?)
    }

    /// Verifies against `keys`, or the scope's own keys when `None`.
    pub fn verify_detached(&self, signature: &str, body: &[u8], keys: Option<Vec<Jwk>>) -> Result<()> {
        let keys = self.candidates(keys)?;
        if !verify_detached(signature.trim(), body, &keys) {
            bail!("signature verification failed");
        }
        Ok(())
    }

    /// Signs `payload` without `exclude` and returns the payload with the
    /// signature stored at `exclude`.
    pub fn sign_payload(&self, payload: &[u8], exclude: &str) -> Result<String> {
        let mut payload: Value = serde_json::from_slice(payload).context("payload must be JSON")?;
        let Some(object) = payload.as_object_mut() else {
            bail!("payload must be a JSON object");
        };
        object.remove(exclude);
        let signature = self.engine.sign_payload_excluding(&payload, exclude, &self.scope)?;
        payload[exclude] = Value::String(signature);
        Ok(serde_json::to_string_pretty(&payload)?)
    }

    pub fn verify_payload(&self, payload: &[u8], path: &str, keys: Option<Vec<Jwk>>) -> Result<()> {
        let payload: Value = serde_json::from_slice(payload).context("payload must be JSON")?;
        let keys = self.candidates(keys)?;
        if !verify_payload_signature(&payload, path, &keys) {
            bail!("payload signature at '{path}' failed verification");
        }
        Ok(())
    }

    fn candidates(&self, keys: Option<Vec<Jwk>>) -> Result<Vec<Jwk>> {
        match keys {
            Some(keys) => Ok(keys),
            None => Ok(self.keys().public_keys(&self.scope)?),
        }
    }

    /// Inspects the scope's signing identity without modifying it.
    pub fn doctor(&self, key_store: &str) -> HealthReport {
        let mut checks = Vec::new();

        let private_key = match self.keys().private_key(&self.scope) {
            Ok(Some(key)) => {
                checks.push(HealthCheck::pass("private_key", "P-256 key loaded"));
                Some(key)
            }
            Ok(None) => {
                checks.push(HealthCheck::warn("private_key", "no key stored; run `ucp-trust keygen`"));
                None
            }
            Err(e) => {
                checks.push(HealthCheck::fail("private_key", e.to_string()));
                None
            }
        };

        let public_key = match self.keys().public_key(&self.scope) {
            Ok(Some(key)) => {
                checks.push(HealthCheck::pass("public_key", "P-256 key loaded"));
                Some(key)
            }
            Ok(None) => {
                checks.push(HealthCheck::warn("public_key", "no key stored"));
                None
            }
            Err(e) => {
                checks.push(HealthCheck::fail("public_key", e.to_string()));
                None
            }
        };

        match self.keys().key_id(&self.scope) {
            Ok(kid) if kid.starts_with(DEFAULT_KEY_ID_PREFIX) => {
                checks.push(HealthCheck::warn("key_id", format!("no key id stored, default {kid}")));
            }
            Ok(kid) => checks.push(HealthCheck::pass("key_id", kid)),
            Err(e) => checks.push(HealthCheck::fail("key_id", e.to_string())),
        }

        if let (Some(_), Some(public_key)) = (private_key, public_key) {
            checks.push(self.self_test(&public_key));
        }

        HealthReport::new(&self.scope, key_store, checks)
    }

    /// Signs a fixed body with the private key and checks it against the stored public key.
    fn self_test(&self, public_key: &PublicKey) -> HealthCheck {
        let outcome = self.keys().key_id(&self.scope).map_err(anyhow::Error::from).and_then(|kid| {
            let jwk = public_key_to_jwk(public_key, &kid)?;
            let signature = self.engine.build_detached(SELF_TEST_BODY, &self.scope)?;
            Ok((jwk, signature))
        });

        match outcome {
            Ok((jwk, signature)) => {
                if verify_detached(&signature, SELF_TEST_BODY, std::slice::from_ref(&jwk)) {
                    HealthCheck::pass("self_test", "signature verified with stored public key")
                } else {
                    HealthCheck::fail("self_test", "public key does not match private key")
                }
            }
            Err(e) => HealthCheck::fail("self_test", e.to_string()),
        }
    }
}

/// Negotiates two capability documents and returns the result as pretty JSON.
///
/// Each document is either a JSON array of capabilities or a profile.
pub fn negotiate_documents(available: &str, requested: &str) -> Result<String> {
    let available = parse_capabilities(available).context("available capabilities")?;
    let requested = parse_capabilities(requested).context("requested capabilities")?;
    Ok(serde_json::to_string_pretty(&negotiate(&available, &requested))?)
}

fn parse_capabilities(document: &str) -> Result<Vec<Capability>> {
    let value: Value = serde_json::from_str(document).context("not JSON")?;
    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }
    if value.is_object() {
        return Ok(Profile::from_json(document)?.ucp.capabilities);
    }
    bail!("expected a capability array or a profile object")
}

/// Parses verification keys from a JWK Set, a profile, a JWK array or a single JWK.
pub fn parse_keys(document: &str) -> Result<Vec<Jwk>> {
    let value: Value = serde_json::from_str(document).context("key document is not JSON")?;
    if value.get("keys").is_some() {
        let jwks: Jwks = serde_json::from_value(value)?;
        return Ok(jwks.keys);
    }
    if value.get("signing_keys").is_some() {
        return Ok(serde_json::from_value::<Profile>(value)?.signing_keys);
    }
    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }
    if value.get("kty").is_some() {
        return Ok(vec![serde_json::from_value(value)?]);
    }
    bail!("expected a JWK Set, a profile, or JWKs")
}

/// Reads a file, or stdin when `path` is `None` or `-`.
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::read(path).with_context(|| format!("cannot read {}", path.display()))
        }
        _ => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer).context("cannot read stdin")?;
            Ok(buffer)
        }
    }
}
