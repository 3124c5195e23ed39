//! Durable persistence of the store.
//!
//! The store is bound to a key-value storage: one entry per persisted key,
//! each a JSON envelope carrying a shape version. Startup rehydrates from
//! whatever is there and never fails on a bad entry; every mutation writes
//! the full state back.

use crate::collection::Collection;
use crate::{Error, Medication, Result, Shot, ViewMode};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const KEY_MEDICATIONS: &str = "medications";
pub const KEY_SHOTS: &str = "shots";
pub const KEY_VIEW_MODE: &str = "medicViewMode";

/// Current shape version written into every envelope
pub const STORE_VERSION: u32 = 1;

/// String-keyed durable storage
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

// ============================================================================
// File storage
// ============================================================================

/// One `<key>.json` file per entry inside a namespace directory
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        tracing::debug!("Read {} bytes from {:?}", contents.len(), path);
        Ok(Some(contents))
    }

    /// Atomically replace the entry: temp file in the same directory,
    /// exclusive lock, fsync, rename over the original
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        let temp = NamedTempFile::new_in(&self.dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Wrote {:?}", path);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Memory storage
// ============================================================================

/// In-process storage for tests and embedders that bring their own durability
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// Persistor
// ============================================================================

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    value: serde_json::Value,
}

/// Everything that survives a restart
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub medications: Collection<Medication>,
    pub shots: Collection<Shot>,
    pub view_mode: ViewMode,
}

/// Binds the store's durable keys to a [`KeyValueStorage`]
#[derive(Debug)]
pub struct Persistor<S> {
    storage: S,
}

impl<S: KeyValueStorage> Persistor<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Load the last persisted state
    ///
    /// Each key falls back to its empty value on its own, so one corrupt
    /// entry does not wipe the others.
    pub fn rehydrate(&self) -> Snapshot {
        let medications: HashMap<uuid::Uuid, Medication> = self.load_or_default(KEY_MEDICATIONS);
        let shots: HashMap<uuid::Uuid, Shot> = self.load_or_default(KEY_SHOTS);
        let view_mode: ViewMode = self.load_or_default(KEY_VIEW_MODE);

        tracing::info!(
            "Rehydrated {} medications and {} shots",
            medications.len(),
            shots.len()
        );

        Snapshot {
            medications: Collection::from_keyed(medications),
            shots: Collection::from_keyed(shots),
            view_mode,
        }
    }

    /// Write every durable key (whole-state write)
    pub fn persist(
        &mut self,
        medications: &Collection<Medication>,
        shots: &Collection<Shot>,
        view_mode: ViewMode,
    ) -> Result<()> {
        self.persist_key(KEY_MEDICATIONS, medications)?;
        self.persist_key(KEY_SHOTS, shots)?;
        self.persist_key(KEY_VIEW_MODE, &view_mode)?;
        Ok(())
    }

    /// Write one key inside a versioned envelope
    pub fn persist_key<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(&EnvelopeRef {
            version: STORE_VERSION,
            value,
        })?;
        self.storage.set(key, &encoded)
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.load(key) {
            Ok(Some(value)) => value,
            Ok(None) => {
                tracing::debug!("No persisted entry for {}", key);
                T::default()
            }
            Err(e) => {
                tracing::warn!("Unable to rehydrate {}: {}. Using defaults.", key, e);
                T::default()
            }
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        migrate(key, value).map(Some)
    }
}

/// Bring a stored entry up to the current shape
///
/// Version 0 is a bare value without an envelope.
fn migrate<T: DeserializeOwned>(key: &str, raw: serde_json::Value) -> Result<T> {
    let is_envelope = raw
        .as_object()
        .map(|o| o.len() == 2 && o.contains_key("version") && o.contains_key("value"))
        .unwrap_or(false);

    if !is_envelope {
        tracing::info!("Migrating unversioned entry {}", key);
        return Ok(serde_json::from_value(raw)?);
    }

    let envelope: Envelope = serde_json::from_value(raw)?;
    match envelope.version {
        v if v <= STORE_VERSION => Ok(serde_json::from_value(envelope.value)?),
        v => Err(Error::Storage(format!(
            "entry {} has version {}, newer than supported {}",
            key, v, STORE_VERSION
        ))),
    }
}
