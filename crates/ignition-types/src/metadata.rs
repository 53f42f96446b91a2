use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Per-version execution settings: whether the instance gets WASI wired in,
/// and the set of host URLs it is permitted to call out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub wasi_enabled: bool,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

/// One immutable content-addressed version of a function's Wasm blob.
///
/// Everything but `tags` is fixed once committed; `tags` is the one field a
/// later `push`/`reassign_tag` is allowed to mutate in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// First 12 hex characters of `full_digest`; also the blob's filename.
    pub short_hash: String,
    pub full_digest: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub size: u64,
    pub tags: BTreeSet<String>,
    pub settings: Settings,
}

/// Truncates a full digest to the 12-character short hash used as the blob
/// filename and pull shortcut.
pub fn short_hash_of(full_digest: &str) -> String {
    full_digest.chars().take(12).collect()
}

/// Persisted metadata for one `(namespace, name)` function identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Most-recent-first, by convention of the caller that appends to it.
    pub versions: Vec<Version>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            versions: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn version_by_short_hash(&self, short_hash: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.short_hash == short_hash)
    }

    pub fn version_by_tag(&self, tag: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.tags.contains(tag))
    }

    pub fn version_by_full_digest(&self, full_digest: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.full_digest == full_digest)
    }

    /// Removes `tag` from every version; a tag belongs to at most one
    /// version at any time, so this must run before a tag is (re)bound.
    pub fn unbind_tag(&mut self, tag: &str) {
        for version in &mut self.versions {
            version.tags.remove(tag);
        }
    }

    /// Inserts a newly-committed version at the front (most-recent-first).
    /// Caller is responsible for having already deduped by `short_hash`.
    pub fn insert_version_front(&mut self, version: Version) {
        self.versions.insert(0, version);
    }

    /// Moves `tag` onto the version carrying `full_digest`. Returns `false`
    /// if no version has that digest, leaving the tag where it was.
    pub fn reassign_tag(&mut self, tag: &str, full_digest: &str) -> bool {
        if self.version_by_full_digest(full_digest).is_none() {
            return false;
        }
        self.unbind_tag(tag);
        for version in &mut self.versions {
            if version.full_digest == full_digest {
                version.tags.insert(tag.to_string());
                break;
            }
        }
        true
    }

    /// The version to prefer for auto-reload: the one tagged `latest`, else
    /// the first (most recent) version.
    pub fn preferred_reload_version(&self) -> Option<&Version> {
        self.version_by_tag("latest").or_else(|| self.versions.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn version(short: &str, digest: &str, tags: &[&str]) -> Version {
        Version {
            short_hash: short.to_string(),
            full_digest: digest.to_string(),
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            size: 4,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            settings: Settings::default(),
        }
    }

    #[test]
    fn tag_moves_off_previous_holder() {
        let mut meta = Metadata::new(datetime!(2026-01-01 00:00:00 UTC));
        meta.insert_version_front(version("aaaaaaaaaaaa", "aaaaaaaaaaaabbbb", &["v1"]));
        meta.insert_version_front(version("bbbbbbbbbbbb", "bbbbbbbbbbbbcccc", &[]));

        assert!(meta.reassign_tag("v1", "bbbbbbbbbbbbcccc"));

        let holders: Vec<_> = meta
            .versions
            .iter()
            .filter(|v| v.tags.contains("v1"))
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].full_digest, "bbbbbbbbbbbbcccc");
    }

    #[test]
    fn reassign_unknown_digest_is_noop() {
        let mut meta = Metadata::new(datetime!(2026-01-01 00:00:00 UTC));
        meta.insert_version_front(version("aaaaaaaaaaaa", "aaaaaaaaaaaabbbb", &["v1"]));
        assert!(!meta.reassign_tag("v1", "doesnotexist"));
        assert!(meta.version_by_tag("v1").is_some());
    }

    #[test]
    fn preferred_reload_prefers_latest_tag() {
        let mut meta = Metadata::new(datetime!(2026-01-01 00:00:00 UTC));
        meta.insert_version_front(version("bbbbbbbbbbbb", "bbbbbbbbbbbbcccc", &[]));
        meta.insert_version_front(version("aaaaaaaaaaaa", "aaaaaaaaaaaabbbb", &["latest"]));
        // Most-recent-first: "aaaa..." is index 0 but "bbbb..." carries `latest`... test the tag wins.
        assert_eq!(
            meta.preferred_reload_version().unwrap().full_digest,
            "aaaaaaaaaaaabbbb"
        );
    }

    #[test]
    fn preferred_reload_falls_back_to_most_recent() {
        let mut meta = Metadata::new(datetime!(2026-01-01 00:00:00 UTC));
        meta.insert_version_front(version("aaaaaaaaaaaa", "aaaaaaaaaaaabbbb", &[]));
        meta.insert_version_front(version("bbbbbbbbbbbb", "bbbbbbbbbbbbcccc", &[]));
        assert_eq!(
            meta.preferred_reload_version().unwrap().full_digest,
            "bbbbbbbbbbbbcccc"
        );
    }
}
