//! Runtime configuration.
//!
//! Loaded from a TOML file; a missing file yields [`TrustConfig::default`].
//!
//! ```toml
//! key_store = "/var/lib/ucp/keys.toml"
//! default_scope = "store-1"
//! log_format = "json"
//!
//! [profile_cache]
//! ttl_secs = 300
//! capacity = 128
//! ```

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TrustError};

/// Longest profile cache TTL accepted, one day.
pub const MAX_PROFILE_TTL_SECS: u64 = 86_400;

const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Path of the TOML key store.
    pub key_store: PathBuf,
    /// Scope used when a command does not name one.
    pub default_scope: String,
    /// Log output format, `pretty` or `json`.
    pub log_format: String,
    /// Profile cache sizing.
    pub profile_cache: ProfileCacheConfig,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            key_store: PathBuf::from("ucp-keys.toml"),
            default_scope: "default".to_owned(),
            log_format: "pretty".to_owned(),
            profile_cache: ProfileCacheConfig::default(),
        }
    }
}

/// Profile cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileCacheConfig {
    /// Seconds a fetched profile stays fresh.
    pub ttl_secs: u64,
    /// Maximum number of cached profiles.
    pub capacity: usize,
}

impl Default for ProfileCacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300, capacity: 128 }
    }
}

impl TrustConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ConfigError`] if the document does not parse or
    /// fails [`validate`](Self::validate).
    ///
    /// # Examples
    ///
    /// ```
    /// use ucp_trust::config::TrustConfig;
    ///
    /// let config = TrustConfig::from_toml_str(r#"default_scope = "store-1""#).unwrap();
    /// assert_eq!(config.default_scope, "store-1");
    /// assert_eq!(config.log_format, "pretty");
    /// ```
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| TrustError::ConfigError(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration file at `path`, or the defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "loading configuration");
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => {
                Err(TrustError::ConfigError(format!("cannot read {}: {e}", path.display())))
            }
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::ConfigError`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.key_store.as_os_str().is_empty() {
            return Err(TrustError::ConfigError("key_store must not be empty".to_owned()));
        }
        if self.default_scope.trim().is_empty() {
            return Err(TrustError::ConfigError("default_scope must not be empty".to_owned()));
        }
        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            return Err(TrustError::ConfigError(format!(
                "log_format must be one of {LOG_FORMATS:?}, got '{}'",
                self.log_format
            )));
        }
        if self.profile_cache.capacity == 0 {
            return Err(TrustError::ConfigError(
                "profile_cache.capacity must be greater than 0".to_owned(),
            ));
        }
        if self.profile_cache.ttl_secs > MAX_PROFILE_TTL_SECS {
            return Err(TrustError::ConfigError(format!(
                "profile_cache.ttl_secs must be at most {MAX_PROFILE_TTL_SECS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrustConfig::default().validate().is_ok());
        assert_eq!(TrustConfig::from_toml_str("").unwrap(), TrustConfig::default());
    }

    #[test]
    fn test_full_document() {
        let config = TrustConfig::from_toml_str(
            r#"
            key_store = "/tmp/keys.toml"
            default_scope = "store-9"
            log_format = "json"

            [profile_cache]
            ttl_secs = 60
            capacity = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.key_store, PathBuf::from("/tmp/keys.toml"));
        assert_eq!(config.default_scope, "store-9");
        assert_eq!(config.log_format, "json");
        assert_eq!(config.profile_cache, ProfileCacheConfig { ttl_secs: 60, capacity: 4 });
    }

    #[test]
    fn test_partial_profile_cache_keeps_defaults() {
        let config = TrustConfig::from_toml_str("[profile_cache]\nttl_secs = 10").unwrap();
        assert_eq!(config.profile_cache.ttl_secs, 10);
        assert_eq!(config.profile_cache.capacity, 128);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for toml in [
            r#"key_store = """#,
            r#"default_scope = "  ""#,
            r#"log_format = "xml""#,
            "[profile_cache]\ncapacity = 0",
            "[profile_cache]\nttl_secs = 86401",
            "default_scope = [",
        ] {
            assert!(
                matches!(TrustConfig::from_toml_str(toml), Err(TrustError::ConfigError(_))),
                "{toml} accepted"
            );
        }
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrustConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, TrustConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ucp.toml");
        fs::write(&path, "default_scope = \"from-file\"\n").unwrap();

        assert_eq!(TrustConfig::load(&path).unwrap().default_scope, "from-file");
    }
}
