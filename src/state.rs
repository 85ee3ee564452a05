//! Persisted resource state
//!
//! The state file is a JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "last_updated": "2024-01-01T00:00:00Z",
//!   "resources": {
//!     "organization.main": {"kind": "organization", "attributes": {"id": "…", "name": "acme"}}
//!   }
//! }
//! ```
//!
//! Attribute keys are attribute names, never wire keys. Every write goes to
//! a temporary file first and is renamed into place.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::{Record, ResourceDescriptor, StateSink, mapper};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::resource::CloudRegistry;

/// Default state file, relative to the working directory
pub const DEFAULT_STATE: &str = "cratedb.state.json";

const STATE_VERSION: u32 = 1;

/// State document as stored on disk
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateFile {
    pub version: u32,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub resources: BTreeMap<String, StoredResource>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

/// Last-known state of one instance
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredResource {
    pub kind: String,
    pub attributes: Json,
}

/// State file guarded for concurrent commits
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    file: Mutex<StateFile>,
}

impl StateStore {
    /// Load state from disk, or start empty if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        let file = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read state file: {}", path.display()))?;
            let file: StateFile = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
            if file.version > STATE_VERSION {
                bail!(
                    "State file {} has version {}, this build understands up to {}",
                    path.display(),
                    file.version,
                    STATE_VERSION
                );
            }
            log::debug!("Loaded state from {}", path.display());
            file
        } else {
            log::debug!("State file does not exist, using empty state");
            StateFile::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StateFile> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the stored entry for `address`
    pub fn get(&self, address: &str) -> Option<StoredResource> {
        self.lock().resources.get(address).cloned()
    }

    /// Every stored entry, sorted by address
    pub fn entries(&self) -> Vec<(String, StoredResource)> {
        self.lock()
            .resources
            .iter()
            .map(|(address, stored)| (address.clone(), stored.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().resources.is_empty()
    }

    /// Decode the stored record for `address`
    pub fn record(&self, address: &str, descriptor: &ResourceDescriptor) -> Result<Option<Record>> {
        let Some(stored) = self.get(address) else {
            return Ok(None);
        };
        if stored.kind != descriptor.kind() {
            bail!(
                "State for {} holds a {}, expected a {}",
                address,
                stored.kind,
                descriptor.kind()
            );
        }
        let record = mapper::from_document(descriptor, &stored.attributes).map_err(|violations| {
            let details: Vec<_> = violations.iter().map(ToString::to_string).collect();
            anyhow::anyhow!("Corrupt state for {}: {}", address, details.join("; "))
        })?;
        Ok(Some(record))
    }

    /// Store or remove the state of one instance and save
    pub fn put(
        &self,
        address: &str,
        descriptor: &ResourceDescriptor,
        record: Option<&Record>,
    ) -> Result<()> {
        let stored = match record {
            Some(record) => Some(StoredResource {
                kind: descriptor.kind().to_string(),
                attributes: mapper::to_document(descriptor, record)?,
            }),
            None => None,
        };

        let mut file = self.lock();
        match stored {
            Some(stored) => {
                file.resources.insert(address.to_string(), stored);
            }
            None => {
                file.resources.remove(address);
            }
        }
        file.last_updated = Utc::now();
        save(&self.path, &file)
    }

    /// Remove an entry without knowing its kind
    pub fn forget(&self, address: &str) -> Result<bool> {
        let mut file = self.lock();
        if file.resources.remove(address).is_none() {
            return Ok(false);
        }
        file.last_updated = Utc::now();
        save(&self.path, &file)?;
        Ok(true)
    }
}

/// Write the state atomically: temp file in the same directory, then rename
fn save(path: &Path, file: &StateFile) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
    }

    let content = serde_json::to_string_pretty(file).context("Failed to serialize state")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

    log::debug!("Saved state to {}", path.display());
    Ok(())
}

/// Commits executor results into a [`StateStore`]
pub struct StateWriter<'a> {
    store: &'a StateStore,
    registry: &'a CloudRegistry,
}

impl<'a> StateWriter<'a> {
    pub fn new(store: &'a StateStore, registry: &'a CloudRegistry) -> Self {
        Self { store, registry }
    }
}

impl StateSink for StateWriter<'_> {
    fn commit(&self, address: &str, kind: &str, state: Option<&Record>) -> Result<()> {
        let descriptor = self.registry.descriptor(kind)?;
        self.store.put(address, descriptor, state)
    }
}
