// JSON-file record store
//
// One pretty-printed array per collection under the data directory.
// Writes go to a temp file that is renamed over the original, so readers
// never observe a half-written collection.

use dashmap::DashMap;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{Collection, RecordStore};
use crate::errors::{DispatchError, Result};

pub struct JsonFileStore {
    dir: PathBuf,
    /// In-process writer serialization, one mutex per collection
    locks: DashMap<Collection, Arc<Mutex<()>>>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| DispatchError::store_io(dir.display().to_string(), e))?;

        tracing::debug!(path = %dir.display(), "Opened record store");

        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    fn read(&self, collection: Collection) -> Result<Vec<Value>> {
        let path = self.path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| DispatchError::store_io(collection.name(), e))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            DispatchError::store_io(collection.name(), format!("invalid JSON in {}: {}", path.display(), e))
        })
    }

    fn write(&self, collection: Collection, records: &[Value]) -> Result<()> {
        let path = self.path(collection);
        let tmp = self.dir.join(format!(".{}.tmp", collection.file_name()));

        let json = serde_json::to_string_pretty(records)
            .map_err(|e| DispatchError::store_io(collection.name(), e))?;
        fs::write(&tmp, json).map_err(|e| DispatchError::store_io(collection.name(), e))?;
        fs::rename(&tmp, &path).map_err(|e| DispatchError::store_io(collection.name(), e))?;

        tracing::debug!(
            collection = collection.name(),
            records = records.len(),
            "Collection written"
        );
        Ok(())
    }

    fn collection_lock(&self, collection: Collection) -> Arc<Mutex<()>> {
        self.locks.entry(collection).or_default().clone()
    }

    /// Run `f` holding both the in-process mutex and an exclusive advisory
    /// lock on `<collection>.lock`, which also fences other processes.
    fn with_write_lock<R>(&self, collection: Collection, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let lock = self.collection_lock(collection);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let lock_path = self.dir.join(format!("{}.lock", collection.name()));
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| DispatchError::store_io(collection.name(), e))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| DispatchError::store_io(collection.name(), e))?;

        let result = f();

        if let Err(e) = lock_file.unlock() {
            tracing::warn!(collection = collection.name(), error = %e, "Failed to release collection lock");
        }
        result
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self, collection: Collection) -> Result<Vec<Value>> {
        self.read(collection)
    }

    fn save(&self, collection: Collection, records: Vec<Value>) -> Result<()> {
        self.with_write_lock(collection, || self.write(collection, &records))
    }

    fn update(
        &self,
        collection: Collection,
        apply: &mut dyn FnMut(&mut Vec<Value>) -> Result<()>,
    ) -> Result<()> {
        self.with_write_lock(collection, || {
            let mut records = self.read(collection)?;
            apply(&mut records)?;
            self.write(collection, &records)
        })
    }
}
