//! Record store: durable persistence of typed record collections.
//!
//! The store itself treats records as opaque JSON objects and only knows
//! about collection kinds. Typed access goes through [`load_records`] and
//! [`save_records`] using the [`Record`] trait.

use crate::persist::{self, FileLock};
use crate::{EScript, Error, Medication, Mood, RecordKind, Result, Symptom};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Load/save of record collections, in insertion order
pub trait RecordStore {
    fn load_collection(&self, kind: RecordKind) -> Result<Vec<Value>>;

    fn save_collection(&mut self, kind: RecordKind, records: &[Value]) -> Result<()>;

    /// Exclusive hold on one collection for a load-modify-save sequence
    ///
    /// Stores that are never shared between processes need no lock.
    fn lock_collection(&self, _kind: RecordKind) -> Result<CollectionLock> {
        Ok(CollectionLock::unlocked())
    }

    /// Remove every record of every kind
    fn clear_all(&mut self) -> Result<()> {
        for kind in RecordKind::ALL {
            self.save_collection(kind, &[])?;
        }
        Ok(())
    }
}

/// Guard returned by [`RecordStore::lock_collection`]; released on drop
#[derive(Debug)]
pub struct CollectionLock {
    file: Option<FileLock>,
}

impl CollectionLock {
    pub fn unlocked() -> Self {
        Self { file: None }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

/// A typed record living in one collection of the store
pub trait Record: Serialize + DeserializeOwned + Clone {
    const KIND: RecordKind;

    fn id(&self) -> Uuid;
}

impl Record for Medication {
    const KIND: RecordKind = RecordKind::Medication;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Symptom {
    const KIND: RecordKind = RecordKind::Symptom;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Mood {
    const KIND: RecordKind = RecordKind::Mood;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for EScript {
    const KIND: RecordKind = RecordKind::EScript;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Load a typed collection
///
/// Records that fail to decode are logged and skipped rather than failing
/// the whole load.
pub fn load_records<T, S>(store: &S) -> Result<Vec<T>>
where
    T: Record,
    S: RecordStore + ?Sized,
{
    let raw = store.load_collection(T::KIND)?;
    let mut records = Vec::with_capacity(raw.len());

    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping undecodable {} record {}: {}", T::KIND, index, e);
            }
        }
    }

    tracing::debug!("Loaded {} {} records", records.len(), T::KIND);
    Ok(records)
}

/// Replace a typed collection
pub fn save_records<T, S>(store: &mut S, records: &[T]) -> Result<()>
where
    T: Record,
    S: RecordStore + ?Sized,
{
    let raw = records
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    store.save_collection(T::KIND, &raw)
}

// ============================================================================
// JSON file store
// ============================================================================

/// One pretty-printed JSON array file per collection kind
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir` (created lazily on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing a collection
    pub fn collection_path(&self, kind: RecordKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.key()))
    }
}

impl RecordStore for JsonFileStore {
    fn load_collection(&self, kind: RecordKind) -> Result<Vec<Value>> {
        persist::load_json(&self.collection_path(kind))
    }

    fn save_collection(&mut self, kind: RecordKind, records: &[Value]) -> Result<()> {
        persist::save_json_atomic(&self.collection_path(kind), records)?;
        tracing::debug!("Saved {} {} records", records.len(), kind);
        Ok(())
    }

    fn lock_collection(&self, kind: RecordKind) -> Result<CollectionLock> {
        let lock = persist::exclusive_lock(&self.collection_path(kind))?;
        Ok(CollectionLock { file: Some(lock) })
    }

    fn clear_all(&mut self) -> Result<()> {
        for kind in RecordKind::ALL {
            let path = self.collection_path(kind);
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        tracing::info!("Cleared all collections in {:?}", self.dir);
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-process store, mainly for tests and embedding
///
/// Saves can be made to fail to exercise IO error handling.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<RecordKind, Vec<Value>>,
    fail_saves: bool,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail with an IO error
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl RecordStore for MemoryStore {
    fn load_collection(&self, kind: RecordKind) -> Result<Vec<Value>> {
        Ok(self.collections.get(&kind).cloned().unwrap_or_default())
    }

    fn save_collection(&mut self, kind: RecordKind, records: &[Value]) -> Result<()> {
        if self.fail_saves {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("save of {} rejected", kind),
            )));
        }
        self.collections.insert(kind, records.to_vec());
        self.saves += 1;
        Ok(())
    }
}
