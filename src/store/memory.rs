// In-memory record store for tests and embedding

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Collection, RecordStore};
use crate::errors::{DispatchError, Result};

const UNLIMITED: usize = usize::MAX;

pub struct MemoryStore {
    /// One mutex per collection, so an update of one collection may read or
    /// update another without contending on a map shard
    collections: DashMap<Collection, Arc<Mutex<Vec<Value>>>>,
    /// Remaining successful writes before writes start failing
    write_budget: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            write_budget: AtomicUsize::new(UNLIMITED),
        }
    }

    /// Allow `writes` more successful writes; every later write fails with
    /// a store error. Used to exercise partial-failure paths.
    pub fn fail_writes_after(&self, writes: usize) {
        self.write_budget.store(writes, Ordering::SeqCst);
    }

    fn slot(&self, collection: Collection) -> Arc<Mutex<Vec<Value>>> {
        self.collections.entry(collection).or_default().clone()
    }

    fn take_write(&self, collection: Collection) -> Result<()> {
        let granted = self
            .write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                UNLIMITED => Some(UNLIMITED),
                0 => None,
                n => Some(n - 1),
            });
        granted
            .map(|_| ())
            .map_err(|_| DispatchError::store_io(collection.name(), "write rejected"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self, collection: Collection) -> Result<Vec<Value>> {
        let slot = self.slot(collection);
        let records = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(records.clone())
    }

    fn save(&self, collection: Collection, records: Vec<Value>) -> Result<()> {
        let slot = self.slot(collection);
        let mut current = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.take_write(collection)?;
        *current = records;
        Ok(())
    }

    fn update(
        &self,
        collection: Collection,
        apply: &mut dyn FnMut(&mut Vec<Value>) -> Result<()>,
    ) -> Result<()> {
        // The collection mutex is held for the whole read-modify-write
        let slot = self.slot(collection);
        let mut current = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut working = current.clone();
        apply(&mut working)?;
        self.take_write(collection)?;
        *current = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_budget_rejects_later_writes() {
        let store = MemoryStore::new();
        store.fail_writes_after(1);

        store.save(Collection::Messages, vec![json!(1)]).unwrap();
        let err = store
            .update(Collection::Messages, &mut |records| {
                records.push(json!(2));
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.kind(), "StoreIOError");
        assert_eq!(store.load(Collection::Messages).unwrap(), vec![json!(1)]);
    }
}
