//! Scoped key-value configuration stores.
//!
//! [`KeyManager`](super::KeyManager) persists signing identities through the
//! [`ConfigStore`] trait. A scope is an opaque tenant or channel identifier;
//! each scope holds its own set of named string values.

use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, TrustError};

/// Scoped string storage used for key material.
///
/// Implementations return `Ok(None)` for names never written. An empty string
/// is treated as absent by callers.
pub trait ConfigStore: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::StoreError`] if the backing store is unavailable.
    fn get_string(&self, name: &str, scope: &str) -> Result<Option<String>>;

    /// Writes a value.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::StoreError`] if the backing store is unavailable.
    fn set_string(&self, name: &str, scope: &str, value: &str) -> Result<()>;

    /// Writes several values for one scope.
    ///
    /// The default writes entries one at a time, in order. A failure part-way
    /// leaves earlier entries written. Stores that can commit several values at
    /// once should override this.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    fn set_strings(&self, scope: &str, entries: &[(&str, &str)]) -> Result<()> {
        for (name, value) in entries {
            self.set_string(name, scope, value)?;
        }
        Ok(())
    }
}

impl<T: ConfigStore + ?Sized> ConfigStore for &T {
    fn get_string(&self, name: &str, scope: &str) -> Result<Option<String>> {
        (**self).get_string(name, scope)
    }

    fn set_string(&self, name: &str, scope: &str, value: &str) -> Result<()> {
        (**self).set_string(name, scope, value)
    }

    fn set_strings(&self, scope: &str, entries: &[(&str, &str)]) -> Result<()> {
        (**self).set_strings(scope, entries)
    }
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    fn get_string(&self, name: &str, scope: &str) -> Result<Option<String>> {
        (**self).get_string(name, scope)
    }

    fn set_string(&self, name: &str, scope: &str, value: &str) -> Result<()> {
        (**self).set_string(name, scope, value)
    }

    fn set_strings(&self, scope: &str, entries: &[(&str, &str)]) -> Result<()> {
        (**self).set_strings(scope, entries)
    }
}

/// In-memory store. Multi-value writes happen under one lock.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<(String, String), String>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_string(&self, name: &str, scope: &str) -> Result<Option<String>> {
        let values = self.values.read().map_err(|_| poisoned())?;
        Ok(values.get(&(scope.to_owned(), name.to_owned())).cloned())
    }

    fn set_string(&self, name: &str, scope: &str, value: &str) -> Result<()> {
        self.set_strings(scope, &[(name, value)])
    }

    fn set_strings(&self, scope: &str, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        for (name, value) in entries {
            values.insert((scope.to_owned(), (*name).to_owned()), (*value).to_owned());
        }
        Ok(())
    }
}

fn poisoned() -> TrustError {
    TrustError::StoreError("store lock poisoned".to_owned())
}

/// TOML file store, one table per scope.
///
/// ```toml
/// ["store-1"]
/// ucp_signing_key_id = "ucp_3f2a..."
/// ucp_signing_public_key = "-----BEGIN PUBLIC KEY-----\n..."
/// ```
///
/// Every write rewrites the document to a uniquely named temporary file in
/// the same directory and renames it over the original, so
/// [`set_strings`](ConfigStore::set_strings) commits all entries or none and
/// readers never see a partial file.
///
/// Writers hold an exclusive lock on a sibling `<file>.lock` for the whole
/// read-modify-write, so handles opened on the same path (in this process or
/// another) never drop each other's updates.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
}

type Document = BTreeMap<String, BTreeMap<String, String>>;

impl FileConfigStore {
    /// Opens a store at `path`. The file is created on first write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Document> {
        match fs::read_to_string(&self.path) {
            Ok(text) => toml::from_str(&text).map_err(|e| {
                TrustError::StoreError(format!("cannot parse {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => {
                Err(TrustError::StoreError(format!("cannot read {}: {e}", self.path.display())))
            }
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn directory(&self) -> &Path {
        self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
    }

    /// Blocks until this process holds the writer lock. Released when the
    /// returned file is dropped.
    fn lock_writers(&self) -> Result<File> {
        let dir = self.directory();
        fs::create_dir_all(dir).map_err(|e| {
            TrustError::StoreError(format!("cannot create {}: {e}", dir.display()))
        })?;

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                TrustError::StoreError(format!("cannot open {}: {e}", lock_path.display()))
            })?;
        file.lock_exclusive().map_err(|e| {
            TrustError::StoreError(format!("cannot lock {}: {e}", lock_path.display()))
        })?;
        Ok(file)
    }

    fn save(&self, document: &Document) -> Result<()> {
        let text = toml::to_string(document)
            .map_err(|e| TrustError::StoreError(format!("cannot encode store: {e}")))?;

        let dir = self.directory();
        let mut staging = NamedTempFile::new_in(dir).map_err(|e| {
            TrustError::StoreError(format!("cannot stage in {}: {e}", dir.display()))
        })?;
        staging
            .write_all(text.as_bytes())
            .and_then(|()| staging.as_file().sync_all())
            .map_err(|e| {
                TrustError::StoreError(format!("cannot write {}: {e}", staging.path().display()))
            })?;
        staging.persist(&self.path).map_err(|e| {
            TrustError::StoreError(format!("cannot replace {}: {}", self.path.display(), e.error))
        })?;

        debug!(path = %self.path.display(), "key store written");
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn get_string(&self, name: &str, scope: &str) -> Result<Option<String>> {
        // Writes replace the file by rename, so readers need no lock.
        let document = self.load()?;
        Ok(document.get(scope).and_then(|values| values.get(name)).cloned())
    }

    fn set_string(&self, name: &str, scope: &str, value: &str) -> Result<()> {
        self.set_strings(scope, &[(name, value)])
    }

    fn set_strings(&self, scope: &str, entries: &[(&str, &str)]) -> Result<()> {
        let _lock = self.lock_writers()?;
        let mut document = self.load()?;
        let values = document.entry(scope.to_owned()).or_default();
        for (name, value) in entries {
            values.insert((*name).to_owned(), (*value).to_owned());
        }
        self.save(&document)
    }
}
