//! Signing identity lifecycle.

use chrono::{Datelike, Utc};
use p256::{
    PublicKey, SecretKey,
    ecdsa::SigningKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding},
};
use rand::rngs::OsRng;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    error::{Result, TrustError},
    keys::{
        codec::{Jwk, Jwks, public_key_from_pem, public_key_pem_to_jwk, public_key_to_pem},
        store::ConfigStore,
    },
};

/// Prefix of the key id reported before a key has been generated.
pub const DEFAULT_KEY_ID_PREFIX: &str = "ucp-key-";

/// Logical names under which a signing identity is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    /// Key identifier published as `kid`.
    KeyId,
    /// `BEGIN PUBLIC KEY` PEM.
    PublicKeyPem,
    /// PKCS#8 `BEGIN PRIVATE KEY` PEM.
    PrivateKeyPem,
}

impl KeyField {
    /// Returns the configuration store name for this field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::KeyId => "ucp_signing_key_id",
            Self::PublicKeyPem => "ucp_signing_public_key",
            Self::PrivateKeyPem => "ucp_signing_private_key",
        }
    }
}

/// Owns the P-256 signing identity of each scope.
///
/// Key material lives in the injected [`ConfigStore`]; the manager itself holds
/// no state.
///
/// # Concurrency
///
/// Two concurrent [`generate_and_store`](Self::generate_and_store) calls for the
/// same scope both succeed and the last writer wins. Serialize first-use
/// generation per scope if that matters.
///
/// # Examples
///
/// ```
/// use ucp_trust::keys::{KeyManager, MemoryConfigStore};
///
/// let manager = KeyManager::new(MemoryConfigStore::new());
///
/// // No key yet: a year-tagged default id, nothing persisted.
/// assert!(manager.key_id("store-1")?.starts_with("ucp-key-"));
/// assert!(manager.private_key("store-1")?.is_none());
///
/// // First request for public keys generates the identity.
/// let keys = manager.public_keys("store-1")?;
/// assert_eq!(keys.len(), 1);
/// assert_eq!(keys[0].kid, manager.key_id("store-1")?);
/// # Ok::<(), ucp_trust::TrustError>(())
/// ```
#[derive(Debug)]
pub struct KeyManager<S> {
    store: S,
}

impl<S: ConfigStore> KeyManager<S> {
    /// Creates a manager over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    fn read(&self, field: KeyField, scope: &str) -> Result<Option<String>> {
        Ok(self.store.get_string(field.name(), scope)?.filter(|value| !value.is_empty()))
    }

    /// Returns the stored key id, or `ucp-key-<year>` if none is stored.
    ///
    /// The default is not persisted.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::StoreError`] if the store cannot be read.
    pub fn key_id(&self, scope: &str) -> Result<String> {
        Ok(self
            .read(KeyField::KeyId, scope)?
            .unwrap_or_else(|| format!("{DEFAULT_KEY_ID_PREFIX}{}", Utc::now().year())))
    }

    /// Generates a fresh key pair and stores it, replacing any existing one.
    ///
    /// The private key, public key and key id are handed to the store as one
    /// [`set_strings`](ConfigStore::set_strings) call, key id last. Whether the
    /// three land atomically depends on the store.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::KeyGenerationFailed`] if encoding or persistence fails.
    #[instrument(skip(self))]
    pub fn generate_and_store(&self, scope: &str) -> Result<()> {
        let secret = SecretKey::random(&mut OsRng);
        let private_pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| TrustError::KeyGenerationFailed(format!("private key encoding: {e}")))?;
        let public_pem = public_key_to_pem(&secret.public_key())
            .map_err(|e| TrustError::KeyGenerationFailed(e.to_string()))?;
        let key_id = random_key_id();

        self.store
            .set_strings(
                scope,
                &[
                    (KeyField::PrivateKeyPem.name(), private_pem.as_str()),
                    (KeyField::PublicKeyPem.name(), public_pem.as_str()),
                    (KeyField::KeyId.name(), key_id.as_str()),
                ],
            )
            .map_err(|e| TrustError::KeyGenerationFailed(e.to_string()))?;

        info!(scope, key_id = %key_id, "generated signing key");
        Ok(())
    }

    /// Returns the scope's public keys as JWKs.
    ///
    /// Generates and stores a key pair first if none is on record.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails or the stored key is unusable.
    pub fn public_keys(&self, scope: &str) -> Result<Vec<Jwk>> {
        let pem = match self.read(KeyField::PublicKeyPem, scope)? {
            Some(pem) => pem,
            None => {
                debug!(scope, "no public key on record, generating");
                self.generate_and_store(scope)?;
                self.read(KeyField::PublicKeyPem, scope)?.ok_or_else(|| {
                    TrustError::KeyGenerationFailed("public key missing after generation".to_owned())
                })?
            }
        };

        let key_id = self.key_id(scope)?;
        Ok(vec![public_key_pem_to_jwk(&pem, &key_id)?])
    }

    /// Returns the scope's public keys as a JWK Set.
    ///
    /// # Errors
    ///
    /// Same as [`public_keys`](Self::public_keys).
    pub fn jwks(&self, scope: &str) -> Result<Jwks> {
        Ok(Jwks::new(self.public_keys(scope)?))
    }

    /// Reads the scope's signing key.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidKey`] if the stored PEM does not parse.
    pub fn private_key(&self, scope: &str) -> Result<Option<SigningKey>> {
        self.read(KeyField::PrivateKeyPem, scope)?
            .map(|pem| {
                SecretKey::from_pkcs8_pem(pem.trim())
                    .map(SigningKey::from)
                    .map_err(|e| TrustError::InvalidKey(format!("private key PEM: {e}")))
            })
            .transpose()
    }

    /// Reads the scope's public key.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidKey`] if the stored PEM does not parse.
    pub fn public_key(&self, scope: &str) -> Result<Option<PublicKey>> {
        self.read(KeyField::PublicKeyPem, scope)?.map(|pem| public_key_from_pem(&pem)).transpose()
    }
}

fn random_key_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ucp_{}", &id[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{codec::jwk_to_public_key, store::MemoryConfigStore};

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl ConfigStore for ReadOnlyStore {
        fn get_string(&self, _name: &str, _scope: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set_string(&self, _name: &str, _scope: &str, _value: &str) -> Result<()> {
            Err(TrustError::StoreError("read-only".to_owned()))
        }
    }

    #[test]
    fn test_default_key_id_is_year_tagged_and_not_persisted() {
        let manager = KeyManager::new(MemoryConfigStore::new());
        let id = manager.key_id("s").unwrap();

        assert_eq!(id, format!("ucp-key-{}", Utc::now().year()));
        assert_eq!(manager.store().get_string(KeyField::KeyId.name(), "s").unwrap(), None);
    }

    #[test]
    fn test_generate_and_store_persists_triple() {
        let manager = KeyManager::new(MemoryConfigStore::new());
        manager.generate_and_store("s").unwrap();

        let id = manager.key_id("s").unwrap();
        assert!(id.starts_with("ucp_"));
        assert_eq!(id.len(), 20);

        let private = manager.private_key("s").unwrap().expect("private key stored");
        let public = manager.public_key("s").unwrap().expect("public key stored");
        assert_eq!(PublicKey::from(private.verifying_key()), public);
    }

    #[test]
    fn test_public_keys_generates_once() {
        let manager = KeyManager::new(MemoryConfigStore::new());

        let first = manager.public_keys("s").unwrap();
        let second = manager.public_keys("s").unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second, "second call must not regenerate");
        assert_eq!(jwk_to_public_key(&first[0]).unwrap(), manager.public_key("s").unwrap().unwrap());
    }

    #[test]
    fn test_rotation_overwrites() {
        let manager = KeyManager::new(MemoryConfigStore::new());
        manager.generate_and_store("s").unwrap();
        let before = manager.public_keys("s").unwrap();

        manager.generate_and_store("s").unwrap();
        let after = manager.public_keys("s").unwrap();

        assert_ne!(before[0].kid, after[0].kid);
        assert_ne!(before[0].x, after[0].x);
    }

    #[test]
    fn test_scopes_have_independent_keys() {
        let manager = KeyManager::new(MemoryConfigStore::new());
        let a = manager.public_keys("a").unwrap();
        let b = manager.public_keys("b").unwrap();
        assert_ne!(a[0].x, b[0].x);
    }

    #[test]
    fn test_empty_values_are_absent() {
        let store = MemoryConfigStore::new();
        store.set_string(KeyField::PrivateKeyPem.name(), "s", "").unwrap();
        store.set_string(KeyField::PublicKeyPem.name(), "s", "").unwrap();
        store.set_string(KeyField::KeyId.name(), "s", "").unwrap();

        let manager = KeyManager::new(store);
        assert!(manager.private_key("s").unwrap().is_none());
        assert!(manager.public_key("s").unwrap().is_none());
        assert!(manager.key_id("s").unwrap().starts_with(DEFAULT_KEY_ID_PREFIX));
    }

    #[test]
    fn test_corrupt_pem_is_invalid_key() {
        let store = MemoryConfigStore::new();
        store.set_string(KeyField::PrivateKeyPem.name(), "s", "garbage").unwrap();
        store.set_string(KeyField::PublicKeyPem.name(), "s", "garbage").unwrap();

        let manager = KeyManager::new(store);
        assert!(matches!(manager.private_key("s"), Err(TrustError::InvalidKey(_))));
        assert!(matches!(manager.public_key("s"), Err(TrustError::InvalidKey(_))));
    }

    #[test]
    fn test_store_failure_is_generation_failure() {
        let manager = KeyManager::new(ReadOnlyStore);
        assert!(matches!(manager.generate_and_store("s"), Err(TrustError::KeyGenerationFailed(_))));
        assert!(matches!(manager.public_keys("s"), Err(TrustError::KeyGenerationFailed(_))));
    }

    #[test]
    fn test_jwks_contains_public_keys() {
        let manager = KeyManager::new(MemoryConfigStore::new());
        let jwks = manager.jwks("s").unwrap();
        assert_eq!(jwks.keys, manager.public_keys("s").unwrap());
    }
}
