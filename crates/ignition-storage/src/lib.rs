//! The content-addressed registry: embedded KV metadata store plus the
//! on-disk blob store.

pub mod in_memory;
pub mod kv_store;
#[cfg(feature = "rocksdb")]
pub mod rocks;

mod registry;

pub use in_memory::InMemoryStore;
pub use kv_store::MetadataStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;
pub use registry::{blob_root_under, registry_db_path, Registry};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ignition_types::{FunctionKey, Settings};
    use tempfile::tempdir;

    use super::*;

    fn registry() -> (Registry, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        (Registry::new(store, dir.path()), dir)
    }

    fn key() -> FunctionKey {
        FunctionKey::new("ns1", "f").unwrap()
    }

    #[test]
    fn push_then_pull_by_digest_roundtrips() {
        let (registry, _dir) = registry();
        let k = key();
        let digest = "aaaaaaaaaaaabbbbccccdddd";
        let version = registry
            .push(&k, b"hello", digest, Some("latest"), Settings::default())
            .unwrap();
        assert_eq!(version.full_digest, digest);

        let (bytes, pulled) = registry.pull(&k, digest).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(pulled.full_digest, digest);
    }

    #[test]
    fn pull_by_tag_after_reassign_matches_pull_by_digest() {
        let (registry, _dir) = registry();
        let k = key();
        registry
            .push(&k, b"v1", "aaaaaaaaaaaa1111", Some("v1"), Settings::default())
            .unwrap();
        registry
            .push(&k, b"v2", "bbbbbbbbbbbb2222", None, Settings::default())
            .unwrap();

        registry.reassign_tag(&k, "v1", "bbbbbbbbbbbb2222").unwrap();

        let (by_tag, _) = registry.pull(&k, "v1").unwrap();
        let (by_digest, _) = registry.pull(&k, "bbbbbbbbbbbb2222").unwrap();
        assert_eq!(by_tag, by_digest);
        assert_eq!(by_tag, b"v2");
    }

    #[test]
    fn repushing_identical_content_does_not_duplicate_version() {
        let (registry, _dir) = registry();
        let k = key();
        registry
            .push(&k, b"same", "cccccccccccc3333", Some("t1"), Settings::default())
            .unwrap();
        registry
            .push(&k, b"same", "cccccccccccc3333", Some("t2"), Settings::default())
            .unwrap();

        let metadata = registry.get(&k).unwrap();
        assert_eq!(metadata.versions.len(), 1);
        assert!(metadata.versions[0].tags.contains("t2"));
    }

    #[test]
    fn tag_uniqueness_across_versions() {
        let (registry, _dir) = registry();
        let k = key();
        registry
            .push(&k, b"v1", "aaaaaaaaaaaa1111", Some("v1"), Settings::default())
            .unwrap();
        registry
            .push(&k, b"v2", "bbbbbbbbbbbb2222", Some("v1"), Settings::default())
            .unwrap();

        let metadata = registry.get(&k).unwrap();
        let holders: Vec<_> = metadata
            .versions
            .iter()
            .filter(|v| v.tags.contains("v1"))
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].full_digest, "bbbbbbbbbbbb2222");
    }

    #[test]
    fn pull_unknown_reference_is_invalid_reference() {
        let (registry, _dir) = registry();
        let k = key();
        registry
            .push(&k, b"v1", "aaaaaaaaaaaa1111", Some("v1"), Settings::default())
            .unwrap();
        let err = registry.pull(&k, "nope").unwrap_err();
        assert!(err.is(ignition_types::Domain::Registry, "invalid_reference"));
    }

    #[test]
    fn pull_missing_function_is_not_found() {
        let (registry, _dir) = registry();
        let err = registry.pull(&key(), "latest").unwrap_err();
        assert!(err.is(ignition_types::Domain::Registry, "not_found"));
    }

    #[test]
    fn digest_exists_checks_short_hash_prefix() {
        let (registry, _dir) = registry();
        let k = key();
        registry
            .push(&k, b"v1", "aaaaaaaaaaaa1111", None, Settings::default())
            .unwrap();
        assert!(registry.digest_exists(&k, "aaaaaaaaaaaa1111").unwrap());
        assert!(!registry.digest_exists(&k, "zzzzzzzzzzzzzzzz").unwrap());
    }

    #[test]
    fn list_all_returns_every_function() {
        let (registry, _dir) = registry();
        registry
            .push(&key(), b"v1", "aaaaaaaaaaaa1111", None, Settings::default())
            .unwrap();
        registry
            .push(
                &FunctionKey::new("ns1", "g").unwrap(),
                b"v1",
                "bbbbbbbbbbbb2222",
                None,
                Settings::default(),
            )
            .unwrap();
        assert_eq!(registry.list_all().unwrap().len(), 2);
    }
}
