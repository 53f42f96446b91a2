use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use ignition_types::{short_hash_of, Error, FunctionKey, Metadata, Result, Settings, Version};
use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::kv_store::MetadataStore;

const KEY_PREFIX: &str = "func:";

fn metadata_key(key: &FunctionKey) -> String {
    format!("{KEY_PREFIX}{}", key.as_storage_key())
}

/// The content-addressed registry: a metadata KV store plus the on-disk blob
/// store it references.
///
/// Blobs live at `<root>/storage/<ns>/<name>/versions/<short_hash>.wasm`;
/// metadata lives in `store`, JSON-encoded, keyed `func:<ns>/<name>`.
///
/// `MetadataStore` only exposes point `get`/`put`, so a read-modify-write
/// (`push`, `reassign_tag`) is not atomic at the store level. `locks` holds
/// one mutex per function key, held across the load→mutate→save sequence,
/// so concurrent mutations of the same key serialize instead of racing on a
/// lost update. Different keys never contend with each other.
#[derive(Debug, Clone)]
pub struct Registry {
    store: Arc<dyn MetadataStore>,
    blob_root: PathBuf,
    locks: Arc<DashMap<FunctionKey, Arc<Mutex<()>>>>,
}

impl Registry {
    pub fn new(store: Arc<dyn MetadataStore>, blob_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            blob_root: blob_root.into(),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// The mutex serializing reads and writes of `key`'s metadata entry.
    fn lock_for(&self, key: &FunctionKey) -> Arc<Mutex<()>> {
        self.locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn blob_dir(&self, key: &FunctionKey) -> PathBuf {
        self.blob_root
            .join(key.namespace())
            .join(key.name())
            .join("versions")
    }

    fn blob_path(&self, key: &FunctionKey, short_hash: &str) -> PathBuf {
        self.blob_dir(key).join(format!("{short_hash}.wasm"))
    }

    fn load_metadata(&self, key: &FunctionKey) -> Result<Option<Metadata>> {
        let Some(raw) = self.store.get(&metadata_key(key))? else {
            return Ok(None);
        };
        let metadata: Metadata = serde_json::from_slice(&raw)
            .map_err(|e| Error::registry_error(format!("corrupt metadata for {key}: {e}")))?;
        Ok(Some(metadata))
    }

    fn save_metadata(&self, key: &FunctionKey, metadata: &Metadata) -> Result<()> {
        let raw = serde_json::to_vec(metadata)
            .map_err(|e| Error::registry_error(format!("failed to encode metadata: {e}")))?;
        self.store.put(&metadata_key(key), raw)
    }

    pub fn get(&self, key: &FunctionKey) -> Result<Metadata> {
        self.load_metadata(key)?
            .ok_or_else(|| Error::registry_not_found(format!("no metadata for {key}")))
    }

    /// Resolves `reference` to `(bytes, Version)`.
    ///
    /// Ordering is fixed: try `reference` truncated to 12 chars as a
    /// `short_hash`; if that misses, scan for a version tagged `reference`
    /// verbatim; if both miss, `invalid_reference`.
    pub fn pull(&self, key: &FunctionKey, reference: &str) -> Result<(Vec<u8>, Version)> {
        let metadata = self.get(key)?;

        let version = {
            let prefix: String = reference.chars().take(12).collect();
            metadata
                .version_by_short_hash(&prefix)
                .or_else(|| metadata.version_by_tag(reference))
                .cloned()
        };
        let version = version
            .ok_or_else(|| Error::invalid_reference(format!("no match for '{reference}'")))?;

        let path = self.blob_path(key, &version.short_hash);
        let bytes = std::fs::read(&path).map_err(|e| {
            Error::registry_error(format!(
                "metadata references blob {} but it is missing on disk: {e}",
                path.display()
            ))
        })?;

        Ok((bytes, version))
    }

    /// Idempotent by `short_hash`: re-pushing identical content never
    /// duplicates the Version record, though it may still move `tag`.
    pub fn push(
        &self,
        key: &FunctionKey,
        bytes: &[u8],
        full_digest: &str,
        tag: Option<&str>,
        settings: Settings,
    ) -> Result<Version> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();

        let now = OffsetDateTime::now_utc();
        let mut metadata = self
            .load_metadata(key)?
            .unwrap_or_else(|| Metadata::new(now));

        let short_hash = short_hash_of(full_digest);

        if metadata.version_by_short_hash(&short_hash).is_some() {
            if let Some(tag) = tag {
                metadata.unbind_tag(tag);
                for version in &mut metadata.versions {
                    if version.short_hash == short_hash {
                        version.tags.insert(tag.to_string());
                        break;
                    }
                }
            }
            metadata.updated_at = now;
            self.save_metadata(key, &metadata)?;
            return Ok(metadata
                .version_by_short_hash(&short_hash)
                .expect("just inserted")
                .clone());
        }

        let dir = self.blob_dir(key);
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::registry_error(format!("failed to create {}: {e}", dir.display())))?;
        let path = self.blob_path(key, &short_hash);
        if !path.exists() {
            std::fs::write(&path, bytes).map_err(|e| {
                Error::registry_error(format!("failed to write blob {}: {e}", path.display()))
            })?;
        }

        if let Some(tag) = tag {
            metadata.unbind_tag(tag);
        }
        let mut tags = std::collections::BTreeSet::new();
        if let Some(tag) = tag {
            tags.insert(tag.to_string());
        }
        let version = Version {
            short_hash: short_hash.clone(),
            full_digest: full_digest.to_string(),
            created_at: now,
            size: bytes.len() as u64,
            tags,
            settings,
        };
        metadata.insert_version_front(version.clone());
        metadata.updated_at = now;
        self.save_metadata(key, &metadata)?;
        Ok(version)
    }

    /// Moves `tag` onto the version identified by `new_full_digest`.
    pub fn reassign_tag(
        &self,
        key: &FunctionKey,
        tag: &str,
        new_full_digest: &str,
    ) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock();

        let mut metadata = self.get(key)?;
        if !metadata.reassign_tag(tag, new_full_digest) {
            return Err(Error::version_not_found(format!(
                "no version with digest '{new_full_digest}'"
            )));
        }
        metadata.updated_at = OffsetDateTime::now_utc();
        self.save_metadata(key, &metadata)
    }

    pub fn digest_exists(&self, key: &FunctionKey, digest_prefix: &str) -> Result<bool> {
        let Some(metadata) = self.load_metadata(key)? else {
            return Ok(false);
        };
        let prefix: String = digest_prefix.chars().take(12).collect();
        Ok(metadata.version_by_short_hash(&prefix).is_some())
    }

    pub fn list_all(&self) -> Result<Vec<Metadata>> {
        self.list_all_keyed().map(|entries| entries.into_iter().map(|(_, m)| m).collect())
    }

    /// Like `list_all`, but keeps each entry's `FunctionKey` — needed by the
    /// control plane's `/loaded` endpoint, which must report `namespace`
    /// and `name` alongside each function's status.
    pub fn list_all_keyed(&self) -> Result<Vec<(FunctionKey, Metadata)>> {
        let raw = self.store.list_prefix(KEY_PREFIX)?;
        raw.into_iter()
            .map(|(key, value)| {
                let metadata: Metadata = serde_json::from_slice(&value)
                    .map_err(|e| Error::registry_error(format!("corrupt metadata entry: {e}")))?;
                let stripped = key.strip_prefix(KEY_PREFIX).unwrap_or(&key);
                let (ns, name) = stripped
                    .split_once('/')
                    .ok_or_else(|| Error::registry_error(format!("malformed metadata key: {key}")))?;
                let function_key = FunctionKey::new(ns, name)
                    .map_err(|e| Error::registry_error(format!("malformed metadata key {key}: {e}")))?;
                Ok((function_key, metadata))
            })
            .collect()
    }
}

/// Default on-disk layout rooted at `root`.
pub fn blob_root_under(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join("storage")
}

pub fn registry_db_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join("registry.db")
}
