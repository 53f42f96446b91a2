//! Plain abstract definition of the metadata key-value store, split between
//! `KeyValueInspect`/`KeyValueMutate` and the concrete backends that
//! implement them (`in_memory`, `rocks`).

use ignition_types::Error;

pub type StorageResult<T> = Result<T, Error>;

/// A single-column key-value store keyed by opaque UTF-8 strings.
///
/// The registry only ever needs point lookups, point writes, and a
/// prefix scan (for `list_all`) — no range queries, no batch API beyond
/// what a single metadata commit needs.
pub trait MetadataStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Returns every `(key, value)` pair whose key starts with `prefix`.
    fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;
}
