//! RocksDB-backed `MetadataStore`: one column family, opened with default
//! options, wrapped so the rest of the crate never sees `rocksdb` types.

use std::path::Path;

use ignition_types::Error;
use rocksdb::{Options, DB};

use crate::kv_store::{MetadataStore, StorageResult};

#[derive(Debug)]
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Opens (creating if absent) the embedded KV data directory at `path`,
    /// i.e. `<root>/registry.db`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)
            .map_err(|e| Error::registry_error(format!("failed to open registry.db: {e}")))?;
        Ok(Self { db })
    }
}

impl MetadataStore for RocksStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| Error::registry_error(format!("read failed for {key}: {e}")))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.db
            .put(key.as_bytes(), value)
            .map_err(|e| Error::registry_error(format!("write failed for {key}: {e}")))
    }

    fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        let iter = self
            .db
            .prefix_iterator(prefix.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::registry_error(format!("scan failed for {prefix}: {e}")))?;
        for (k, v) in iter {
            let key = String::from_utf8_lossy(&k).into_owned();
            if !key.starts_with(prefix) {
                // rocksdb's prefix_iterator can run past the prefix once
                // exhausted; bail rather than return unrelated keys.
                break;
            }
            out.push((key, v.to_vec()));
        }
        Ok(out)
    }
}
