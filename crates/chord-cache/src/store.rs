//! Versioned per-kind store
//!
//! One `DashMap` per entity kind, keyed by the entity's identity. Every write
//! carries a [`Version`]; a write older than what the slot holds is dropped.
//! Merges run under the entry's shard lock and swap in a new `Arc`, so readers
//! only ever observe whole snapshots.

use chord_core::{Identifiable, Patch, Version};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Result of a cache write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write replaced or created the snapshot
    Applied,
    /// The slot already holds a newer version
    Stale,
    /// A patch arrived for an entity the cache does not hold
    Absent,
    /// The merged snapshot no longer fits the model
    Rejected,
}

impl WriteOutcome {
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Stored snapshot and the version that wrote it
///
/// A deleted entity keeps its slot as a tombstone (`snapshot: None`) so a late
/// write stamped before the delete cannot resurrect it.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub snapshot: Option<Arc<T>>,
    pub version: Version,
}

/// Store for one entity kind
#[derive(Debug)]
pub struct Store<T: Identifiable> {
    entries: DashMap<T::Key, CacheEntry<T>>,
}

impl<T: Identifiable> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identifiable> Store<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert or replace a snapshot unless the slot holds a newer version
    pub fn apply_snapshot(&self, model: T, version: Version) -> WriteOutcome {
        let key = model.key();
        let outcome = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().version > version {
                    WriteOutcome::Stale
                } else {
                    occupied.insert(CacheEntry {
                        snapshot: Some(Arc::new(model)),
                        version,
                    });
                    WriteOutcome::Applied
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    snapshot: Some(Arc::new(model)),
                    version,
                });
                WriteOutcome::Applied
            }
        };

        log_outcome::<T>(&key, version, outcome);
        outcome
    }

    /// Merge the present fields of a patch into a held snapshot
    ///
    /// Ignored when the entity is absent or the slot is newer.
    pub fn apply_patch(&self, key: T::Key, patch: &Patch, version: Version) -> WriteOutcome {
        let outcome = match self.entries.get_mut(&key) {
            None => WriteOutcome::Absent,
            Some(mut entry) => {
                if entry.version > version {
                    WriteOutcome::Stale
                } else if let Some(current) = entry.snapshot.clone() {
                    match merge(current.as_ref(), patch) {
                        Some(merged) => {
                            *entry = CacheEntry {
                                snapshot: Some(Arc::new(merged)),
                                version,
                            };
                            WriteOutcome::Applied
                        }
                        None => WriteOutcome::Rejected,
                    }
                } else {
                    WriteOutcome::Absent
                }
            }
        };

        log_outcome::<T>(&key, version, outcome);
        outcome
    }

    /// Rewrite a held snapshot through a closure, under the entry lock
    pub fn modify<F>(&self, key: T::Key, version: Version, f: F) -> WriteOutcome
    where
        F: FnOnce(&T) -> T,
    {
        let outcome = match self.entries.get_mut(&key) {
            None => WriteOutcome::Absent,
            Some(mut entry) => match entry.snapshot.clone() {
                _ if entry.version > version => WriteOutcome::Stale,
                Some(current) => {
                    *entry = CacheEntry {
                        snapshot: Some(Arc::new(f(&current))),
                        version,
                    };
                    WriteOutcome::Applied
                }
                None => WriteOutcome::Absent,
            },
        };

        log_outcome::<T>(&key, version, outcome);
        outcome
    }

    /// Mark an entity deleted at `version`
    pub fn delete(&self, key: T::Key, version: Version) -> WriteOutcome {
        let outcome = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().version > version {
                    WriteOutcome::Stale
                } else {
                    occupied.insert(CacheEntry {
                        snapshot: None,
                        version,
                    });
                    WriteOutcome::Applied
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    snapshot: None,
                    version,
                });
                WriteOutcome::Applied
            }
        };

        log_outcome::<T>(&key, version, outcome);
        outcome
    }

    /// Drop an entity outright, returning its last snapshot
    pub fn evict(&self, key: &T::Key) -> Option<Arc<T>> {
        self.entries.remove(key).and_then(|(_, entry)| entry.snapshot)
    }

    /// Drop every entity matching the predicate, returning how many went
    pub fn evict_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        self.entries.retain(|_, entry| match &entry.snapshot {
            Some(snapshot) if predicate(snapshot) => {
                removed += 1;
                false
            }
            _ => true,
        });
        removed
    }

    /// Tombstone every entity matching the predicate at `version`
    ///
    /// Slots holding a newer version are left alone. Returns how many were
    /// deleted.
    pub fn delete_where<F>(&self, mut predicate: F, version: Version) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut deleted = 0;
        for mut entry in self.entries.iter_mut() {
            let doomed = match &entry.snapshot {
                Some(snapshot) => entry.version <= version && predicate(snapshot),
                None => false,
            };
            if doomed {
                *entry = CacheEntry {
                    snapshot: None,
                    version,
                };
                deleted += 1;
            }
        }
        deleted
    }

    /// Get the current snapshot
    pub fn resolve(&self, key: &T::Key) -> Option<Arc<T>> {
        self.entries.get(key).and_then(|entry| entry.snapshot.clone())
    }

    /// Version of the slot, including tombstones
    pub fn version_of(&self, key: &T::Key) -> Option<Version> {
        self.entries.get(key).map(|entry| entry.version)
    }

    /// Snapshots matching the predicate
    pub fn filter<F>(&self, mut predicate: F) -> Vec<Arc<T>>
    where
        F: FnMut(&T) -> bool,
    {
        self.entries
            .iter()
            .filter_map(|entry| entry.snapshot.clone())
            .filter(|snapshot| predicate(snapshot))
            .collect()
    }

    /// Forget tombstones; used once a fresh session resends full state
    pub fn clear_tombstones(&self) {
        self.entries.retain(|_, entry| entry.snapshot.is_some());
    }

    /// Number of live snapshots
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.snapshot.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn merge<T: Identifiable>(current: &T, patch: &Patch) -> Option<T> {
    let mut value = serde_json::to_value(current).ok()?;
    let Value::Object(fields) = &mut value else {
        return None;
    };
    for (name, field) in patch {
        fields.insert(name.clone(), field.clone());
    }
    serde_json::from_value(value).ok()
}

fn log_outcome<T: Identifiable>(key: &T::Key, version: Version, outcome: WriteOutcome) {
    match outcome {
        WriteOutcome::Applied => {
            tracing::trace!(kind = %T::KIND, key = %key, version = %version, "Cache write applied");
        }
        WriteOutcome::Stale | WriteOutcome::Absent | WriteOutcome::Rejected => {
            tracing::debug!(
                kind = %T::KIND,
                key = %key,
                version = %version,
                outcome = ?outcome,
                "Cache write dropped"
            );
        }
    }
}
