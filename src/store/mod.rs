// Record store
//
// Every entity collection (providers, credentials, conversations, messages)
// is a flat JSON array loaded whole, mutated in memory and written back.
// Callers depend on the RecordStore trait, never on a file path.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{DispatchError, Result};

/// Named collections persisted by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Providers,
    UserApiProviders,
    Conversations,
    Messages,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Providers => "providers",
            Collection::UserApiProviders => "user_api_providers",
            Collection::Conversations => "conversations",
            Collection::Messages => "messages",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.name())
    }
}

/// Storage capability injected into every service
///
/// `update` is the only way to read-modify-write: implementations hold a
/// per-collection write lock for the whole closure, and persist nothing
/// when the closure fails.
pub trait RecordStore: Send + Sync {
    /// Read the current contents of a collection (empty if never written)
    fn load(&self, collection: Collection) -> Result<Vec<Value>>;

    /// Replace a collection wholesale
    fn save(&self, collection: Collection, records: Vec<Value>) -> Result<()>;

    /// Serialized read-modify-write of one collection
    fn update(
        &self,
        collection: Collection,
        apply: &mut dyn FnMut(&mut Vec<Value>) -> Result<()>,
    ) -> Result<()>;
}

/// Load a collection as typed records
pub fn load_all<T: DeserializeOwned>(store: &dyn RecordStore, collection: Collection) -> Result<Vec<T>> {
    decode(collection, store.load(collection)?)
}

/// Typed read-modify-write; the closure's result is handed back on success
pub fn modify<T, R, F>(store: &dyn RecordStore, collection: Collection, f: F) -> Result<R>
where
    T: DeserializeOwned + Serialize,
    F: FnOnce(&mut Vec<T>) -> Result<R>,
{
    let mut f = Some(f);
    let mut output = None;

    store.update(collection, &mut |raw| {
        let f = f
            .take()
            .ok_or_else(|| DispatchError::store_io(collection.name(), "update applied twice"))?;
        let mut typed: Vec<T> = decode(collection, std::mem::take(raw))?;
        let result = f(&mut typed)?;
        *raw = encode(collection, &typed)?;
        output = Some(result);
        Ok(())
    })?;

    output.ok_or_else(|| DispatchError::store_io(collection.name(), "update was not applied"))
}

/// Run store work on tokio's blocking pool. File reads, writes and the
/// cross-process lock wait must not hold an async worker.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DispatchError::store_io("blocking task", e))?
}

fn decode<T: DeserializeOwned>(collection: Collection, raw: Vec<Value>) -> Result<Vec<T>> {
    raw.into_iter()
        .map(|value| {
            serde_json::from_value(value).map_err(|e| {
                DispatchError::store_io(collection.name(), format!("corrupt record: {}", e))
            })
        })
        .collect()
}

fn encode<T: Serialize>(collection: Collection, records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|record| {
            serde_json::to_value(record)
                .map_err(|e| DispatchError::store_io(collection.name(), e))
        })
        .collect()
}
