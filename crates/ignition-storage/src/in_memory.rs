use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::kv_store::{MetadataStore, StorageResult};

/// A `BTreeMap`-backed `MetadataStore`, used in tests and by any caller that
/// does not want the registry's durability guarantees.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    map: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.map.write().insert(key.to_string(), value);
        Ok(())
    }

    fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .map
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
