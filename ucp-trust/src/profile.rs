//! Counterparty profiles and their signing keys.
//!
//! A profile is the JSON document a platform or business publishes to describe
//! itself: the protocol version it speaks, its capabilities, and the public
//! keys its signatures can be checked against. Fetching is delegated to a
//! [`ProfileFetcher`]; [`CachedProfileFetcher`] adds URL validation and a
//! TTL-bounded LRU cache in front of it.

use std::{
    net::IpAddr,
    num::NonZeroUsize,
    sync::Mutex,
    time::{Duration, Instant},
};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::{Host, Url};

use crate::{
    capability::Capability,
    config::ProfileCacheConfig,
    error::{Result, TrustError},
    keys::Jwk,
};

/// Protocol section of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInfo {
    /// Protocol version the publisher speaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Capabilities the publisher offers.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

/// A published profile document.
///
/// Unknown fields are ignored and every field may be absent.
///
/// # Examples
///
/// ```
/// use ucp_trust::profile::Profile;
///
/// let profile = Profile::from_json(r#"{
///     "ucp": {"version": "2026-01-11", "capabilities": [{"name": "dev.ucp.checkout"}]},
///     "signing_keys": [],
///     "payment": {"handlers": []}
/// }"#).unwrap();
///
/// assert_eq!(profile.ucp.capabilities[0].version, "latest");
/// assert!(profile.signing_keys.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Protocol metadata.
    #[serde(default)]
    pub ucp: ProtocolInfo,
    /// Public keys for verifying the publisher's signatures.
    #[serde(default)]
    pub signing_keys: Vec<Jwk>,
}

impl Profile {
    /// Parses a profile document.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::SerializationError`] if `json` is not a JSON object
    /// of the expected shape.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Retrieves profiles by URL.
///
/// Implementations map every failure (network, status, parse) to `None`.
/// Closures `Fn(&Url) -> Option<Profile>` implement this trait.
pub trait ProfileFetcher: Send + Sync {
    /// Fetches and parses the profile at `url`.
    fn fetch(&self, url: &Url) -> Option<Profile>;
}

impl<F> ProfileFetcher for F
where
    F: Fn(&Url) -> Option<Profile> + Send + Sync,
{
    fn fetch(&self, url: &Url) -> Option<Profile> {
        self(url)
    }
}

/// Checks that `url` is an HTTPS URL that does not point at a loopback host.
///
/// # Errors
///
/// Returns [`TrustError::ConfigError`] describing the first violation.
///
/// # Examples
///
/// ```
/// use ucp_trust::profile::validate_profile_url;
///
/// assert!(validate_profile_url("https://shop.example.com/.well-known/ucp").is_ok());
/// assert!(validate_profile_url("http://shop.example.com/.well-known/ucp").is_err());
/// assert!(validate_profile_url("https://127.0.0.1/.well-known/ucp").is_err());
/// ```
pub fn validate_profile_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| TrustError::ConfigError(format!("invalid profile URL '{url}': {e}")))?;

    if parsed.scheme() != "https" {
        return Err(TrustError::ConfigError(format!(
            "profile URL must use HTTPS, got: {}",
            parsed.scheme()
        )));
    }

    let loopback = match parsed.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => {
            return Err(TrustError::ConfigError(format!("profile URL has no host: {url}")));
        }
    };
    if loopback {
        return Err(TrustError::ConfigError(format!(
            "profile URL must not be localhost or loopback: {url}"
        )));
    }

    Ok(parsed)
}

/// [`ProfileFetcher`] wrapper that validates URLs and caches successful fetches.
///
/// Entries expire `ttl` after they were fetched. Failed fetches are not cached,
/// so a transient outage does not pin a missing profile.
///
/// # Thread Safety
///
/// The cache sits behind a `Mutex`; the lock is not held while the inner
/// fetcher runs.
pub struct CachedProfileFetcher<F> {
    inner: F,
    ttl: Duration,
    cache: Mutex<LruCache<String, (Instant, Profile)>>,
}

impl<F> std::fmt::Debug for CachedProfileFetcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedProfileFetcher").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl<F: ProfileFetcher> CachedProfileFetcher<F> {
    /// Creates a cache holding at most `capacity` profiles (minimum 1).
    #[must_use]
    pub fn new(inner: F, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner, ttl, cache: Mutex::new(LruCache::new(capacity)) }
    }

    /// Creates a cache sized from configuration.
    #[must_use]
    pub fn from_config(inner: F, config: &ProfileCacheConfig) -> Self {
        Self::new(inner, config.capacity, Duration::from_secs(config.ttl_secs))
    }

    /// Returns the profile at `url`, from cache when fresh.
    ///
    /// Returns `None` for an invalid URL or a failed fetch.
    pub fn fetch(&self, url: &str) -> Option<Profile> {
        let parsed = match validate_profile_url(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "profile URL rejected");
                return None;
            }
        };
        let key = parsed.as_str().to_owned();

        if let Some(profile) = self.cached(&key) {
            debug!(url = %key, "profile cache hit");
            return Some(profile);
        }

        let profile = self.inner.fetch(&parsed)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, (Instant::now(), profile.clone()));
        }
        debug!(url = %parsed, keys = profile.signing_keys.len(), "profile fetched");
        Some(profile)
    }

    /// Returns the signing keys published at `url`, or an empty list.
    pub fn signing_keys(&self, url: &str) -> Vec<Jwk> {
        self.fetch(url).map(|profile| profile.signing_keys).unwrap_or_default()
    }

    /// Drops every cached profile.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cached(&self, key: &str) -> Option<Profile> {
        let mut cache = self.cache.lock().ok()?;
        let (fetched_at, profile) = cache.get(key)?;
        if fetched_at.elapsed() < self.ttl {
            return Some(profile.clone());
        }
        cache.pop(key);
        None
    }
}
