use std::collections::HashMap;
use std::sync::Mutex;

use crate::ocfl::digest::{DigestAlgorithm, HexDigest};
use crate::ocfl::error::Result;
use crate::ocfl::{RocflError, VersionNum};

/// The version identity a cached inventory was stored under: an immutable version, or a
/// specific revision of the mutable HEAD staged on top of `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CachedVersion {
    pub version_num: VersionNum,
    pub mutable_head: bool,
}

impl CachedVersion {
    /// Returns the `CachedVersion` that immediately follows this one, given whether the next
    /// write creates a new immutable version, a new mutable head revision, or the first
    /// revision of a freshly created mutable head sitting on top of this version.
    fn successors(&self) -> Vec<CachedVersion> {
        let mut successors = Vec::new();

        if let Ok(next) = self.version_num.next() {
            successors.push(CachedVersion {
                version_num: next,
                mutable_head: false,
            });
        }

        if !self.mutable_head {
            successors.push(CachedVersion {
                version_num: self.version_num,
                mutable_head: true,
            });
        } else {
            successors.push(*self);
        }

        successors
    }
}

/// The cached details of an object's most recently written inventory.
#[derive(Debug, Clone)]
pub struct CachedDetails {
    pub digest_algorithm: DigestAlgorithm,
    pub version: CachedVersion,
    pub inventory_digest: HexDigest,
    pub inventory_bytes: Option<Vec<u8>>,
}

/// Tracks the details of the most recently written inventory for every object the engine has
/// touched, so that a writer can detect at commit time that another process raced it, without
/// having to re-read and re-parse the inventory from storage.
///
/// `add`/`update`/`delete` all enforce that the caller is progressing through the version
/// sequence one step at a time; any other transition is rejected with `ObjectOutOfSync` so the
/// caller re-reads the object and retries rather than silently clobbering a concurrent writer's
/// work. A SQL or other externally-backed implementation of this trait is out of scope here;
/// only the in-process default is provided.
pub trait DetailsCache: Send + Sync {
    /// Records the details of a freshly written inventory. Fails with `ObjectOutOfSync` unless
    /// `details.version` is exactly the successor of whatever is currently cached for
    /// `object_id` (or nothing is cached yet).
    fn add(&self, object_id: &str, details: CachedDetails) -> Result<()>;

    /// Runs `f`, and only if it succeeds, records `details` as the object's new cached state.
    /// If `f` fails, the cache is left untouched, mirroring a rolled-back transaction.
    fn update(
        &self,
        object_id: &str,
        details: CachedDetails,
        f: impl FnOnce() -> Result<()>,
    ) -> Result<()>;

    /// Removes any cached details for the object.
    fn delete(&self, object_id: &str) -> Result<()>;

    /// Returns the currently cached details for the object, if any.
    fn get(&self, object_id: &str) -> Option<CachedDetails>;
}

/// The default `DetailsCache`: an in-process map guarded by a single mutex. Adequate for a
/// single-process deployment; a multi-process deployment needs a shared, external cache
/// implementing the same trait.
#[derive(Default)]
pub struct InMemoryDetailsCache {
    entries: Mutex<HashMap<String, CachedDetails>>,
}

impl InMemoryDetailsCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetailsCache for InMemoryDetailsCache {
    fn add(&self, object_id: &str, details: CachedDetails) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();

        if let Some(current) = entries.get(object_id) {
            if !current.version.successors().contains(&details.version) {
                return Err(RocflError::ObjectOutOfSync(object_id.to_string()));
            }
        }

        entries.insert(object_id.to_string(), details);
        Ok(())
    }

    fn update(
        &self,
        object_id: &str,
        details: CachedDetails,
        f: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();

        if let Some(current) = entries.get(object_id) {
            if !current.version.successors().contains(&details.version) {
                return Err(RocflError::ObjectOutOfSync(object_id.to_string()));
            }
        }

        let previous = entries.insert(object_id.to_string(), details);

        if let Err(e) = f() {
            match previous {
                Some(previous) => entries.insert(object_id.to_string(), previous),
                None => entries.remove(object_id),
            };
            return Err(e);
        }

        Ok(())
    }

    fn delete(&self, object_id: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(object_id);
        Ok(())
    }

    fn get(&self, object_id: &str) -> Option<CachedDetails> {
        let entries = self.entries.lock().unwrap();
        entries.get(object_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(version_num: u32, mutable_head: bool) -> CachedDetails {
        CachedDetails {
            digest_algorithm: DigestAlgorithm::Sha512,
            version: CachedVersion {
                version_num: VersionNum::try_from(version_num).unwrap(),
                mutable_head,
            },
            inventory_digest: HexDigest::from("abc123"),
            inventory_bytes: None,
        }
    }

    #[test]
    fn add_first_version_succeeds() {
        let cache = InMemoryDetailsCache::new();
        cache.add("obj-1", details(1, false)).unwrap();
        assert_eq!(1, cache.get("obj-1").unwrap().version.version_num.number);
    }

    #[test]
    fn add_next_immutable_version_succeeds() {
        let cache = InMemoryDetailsCache::new();
        cache.add("obj-1", details(1, false)).unwrap();
        cache.add("obj-1", details(2, false)).unwrap();
        assert_eq!(2, cache.get("obj-1").unwrap().version.version_num.number);
    }

    #[test]
    fn add_mutable_head_on_top_of_immutable_version_succeeds() {
        let cache = InMemoryDetailsCache::new();
        cache.add("obj-1", details(1, false)).unwrap();
        cache.add("obj-1", details(1, true)).unwrap();
        assert!(cache.get("obj-1").unwrap().version.mutable_head);
    }

    #[test]
    fn add_skipping_a_version_fails_out_of_sync() {
        let cache = InMemoryDetailsCache::new();
        cache.add("obj-1", details(1, false)).unwrap();

        match cache.add("obj-1", details(3, false)) {
            Err(RocflError::ObjectOutOfSync(id)) => assert_eq!("obj-1", id),
            other => panic!("expected ObjectOutOfSync, got {:?}", other),
        }
    }

    #[test]
    fn update_rolls_back_on_failure() {
        let cache = InMemoryDetailsCache::new();
        cache.add("obj-1", details(1, false)).unwrap();

        let result = cache.update("obj-1", details(2, false), || {
            Err(RocflError::General("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(1, cache.get("obj-1").unwrap().version.version_num.number);
    }

    #[test]
    fn delete_removes_entry() {
        let cache = InMemoryDetailsCache::new();
        cache.add("obj-1", details(1, false)).unwrap();
        cache.delete("obj-1").unwrap();
        assert!(cache.get("obj-1").is_none());
    }
}
