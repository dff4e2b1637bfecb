//! Compiled-hierarchy cache with explicit invalidation

use crate::error::Result;
use crate::hierarchy::RoleHierarchy;
use crate::store::RoleStore;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default cap on memoized reachable-role sets
pub const DEFAULT_REACHABLE_CAPACITY: usize = 10_000;

/// Compiled hierarchy tagged with the cache generation it was built from
#[derive(Debug, Clone)]
pub struct HierarchySnapshot {
    generation: u64,
    hierarchy: Arc<RoleHierarchy>,
}

impl HierarchySnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn hierarchy(&self) -> &Arc<RoleHierarchy> {
        &self.hierarchy
    }

    pub fn into_hierarchy(self) -> Arc<RoleHierarchy> {
        self.hierarchy
    }
}

impl Deref for HierarchySnapshot {
    type Target = RoleHierarchy;

    fn deref(&self) -> &RoleHierarchy {
        &self.hierarchy
    }
}

struct MemoEntry {
    generation: u64,
    roles: Arc<HashSet<String>>,
}

/// Caches the compiled hierarchy and per-role reachable sets
///
/// Every successful role mutation must call [`HierarchyCache::invalidate`].
/// A compile that started before an invalidation is returned to its caller
/// but never stored. A memoized set is only served to a caller holding a
/// snapshot of the generation it was computed from, and only stored while
/// that generation is current.
pub struct HierarchyCache {
    compiled: RwLock<Option<HierarchySnapshot>>,
    reachable: DashMap<String, MemoEntry>,
    generation: AtomicU64,
    max_reachable: usize,
}

impl HierarchyCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REACHABLE_CAPACITY)
    }

    pub fn with_capacity(max_reachable: usize) -> Self {
        Self {
            compiled: RwLock::new(None),
            reachable: DashMap::new(),
            generation: AtomicU64::new(0),
            max_reachable,
        }
    }

    /// Cached hierarchy, compiling from the store on a miss
    pub async fn get_or_compile(&self, store: &dyn RoleStore) -> Result<HierarchySnapshot> {
        if let Some(snapshot) = self.compiled.read().clone() {
            return Ok(snapshot);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let graph = store.snapshot().await?;
        let snapshot = HierarchySnapshot {
            generation,
            hierarchy: Arc::new(RoleHierarchy::compile_graph(&graph)),
        };

        let mut slot = self.compiled.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *slot = Some(snapshot.clone());
        } else {
            debug!("Role graph changed during compile; result not cached");
        }

        Ok(snapshot)
    }

    /// Reachable set for `role` under `snapshot`, memoized per generation
    pub fn reachable(&self, role: &str, snapshot: &HierarchySnapshot) -> Arc<HashSet<String>> {
        if let Some(entry) = self.reachable.get(role) {
            if entry.generation == snapshot.generation {
                return entry.roles.clone();
            }
        }

        let roles: Arc<HashSet<String>> =
            Arc::new(snapshot.reachable_roles(role).into_iter().collect());

        if snapshot.generation != self.generation.load(Ordering::Acquire) {
            return roles;
        }
        if self.reachable.len() < self.max_reachable || self.reachable.contains_key(role) {
            self.reachable.insert(
                role.to_string(),
                MemoEntry {
                    generation: snapshot.generation,
                    roles: roles.clone(),
                },
            );
        }
        roles
    }

    /// Drop the compiled table and all memoized sets
    pub fn invalidate(&self) {
        let mut slot = self.compiled.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *slot = None;
        self.reachable.clear();
        debug!("Role hierarchy cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            compiled: self.compiled.read().is_some(),
            reachable_entries: self.reachable.len(),
            max_reachable: self.max_reachable,
            generation: self.generation.load(Ordering::Acquire),
        }
    }
}

impl Default for HierarchyCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Whether a compiled hierarchy is currently held
    pub compiled: bool,
    /// Memoized reachable sets
    pub reachable_entries: usize,
    /// Cap on memoized reachable sets
    pub max_reachable: usize,
    /// Number of invalidations so far
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRoleStore;
    use crate::types::{Role, RoleDraft, RoleId};

    fn store() -> InMemoryRoleStore {
        InMemoryRoleStore::with_roles(vec![
            Role::new(RoleId(1), "ADMIN"),
            Role::new(RoleId(2), "USER").with_parent(RoleId(1)),
        ])
    }

    #[tokio::test]
    async fn test_compile_is_cached() {
        let store = store();
        let cache = HierarchyCache::new();

        let first = cache.get_or_compile(&store).await.unwrap();
        let second = cache.get_or_compile(&store).await.unwrap();
        assert!(Arc::ptr_eq(first.hierarchy(), second.hierarchy()));
        assert_eq!(first.generation(), 0);
        assert!(cache.stats().compiled);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompile() {
        let store = store();
        let cache = HierarchyCache::new();

        let before = cache.get_or_compile(&store).await.unwrap();
        assert_eq!(before.edges().len(), 1);

        store
            .save(RoleDraft {
                id: None,
                name: "GUEST".to_string(),
                parent: Some(RoleId(2)),
            })
            .await
            .unwrap();
        cache.invalidate();

        let after = cache.get_or_compile(&store).await.unwrap();
        assert_eq!(after.edges().len(), 2);
        assert_eq!(after.generation(), 1);
        assert_eq!(cache.stats().generation, 1);
    }

    #[tokio::test]
    async fn test_reachable_memo_cleared_on_invalidate() {
        let store = store();
        let cache = HierarchyCache::new();
        let hierarchy = cache.get_or_compile(&store).await.unwrap();

        let reachable = cache.reachable("ADMIN", &hierarchy);
        assert!(reachable.contains("USER"));
        assert_eq!(cache.stats().reachable_entries, 1);

        cache.invalidate();
        let stats = cache.stats();
        assert_eq!(stats.reachable_entries, 0);
        assert!(!stats.compiled);
    }

    #[tokio::test]
    async fn test_reachable_from_snapshot_taken_before_invalidate() {
        let store = InMemoryRoleStore::with_roles(vec![
            Role::new(RoleId(1), "ADMIN"),
            Role::new(RoleId(2), "SECRET").with_parent(RoleId(1)),
        ]);
        let cache = HierarchyCache::new();

        let old = cache.get_or_compile(&store).await.unwrap();

        // A mutation lands between the reader's compile and its lookup
        store
            .save(RoleDraft {
                id: Some(RoleId(2)),
                name: "SECRET".to_string(),
                parent: None,
            })
            .await
            .unwrap();
        cache.invalidate();

        assert!(cache.reachable("ADMIN", &old).contains("SECRET"));
        assert_eq!(cache.stats().reachable_entries, 0);

        let fresh = cache.get_or_compile(&store).await.unwrap();
        assert!(fresh.edges().is_empty());
        assert!(!cache.reachable("ADMIN", &fresh).contains("SECRET"));
        assert!(!cache.reachable("ADMIN", &fresh).contains("SECRET"));
    }

    #[tokio::test]
    async fn test_reachable_capacity() {
        let store = InMemoryRoleStore::with_roles(vec![
            Role::new(RoleId(1), "A"),
            Role::new(RoleId(2), "B").with_parent(RoleId(1)),
        ]);
        let cache = HierarchyCache::with_capacity(1);
        let snapshot = cache.get_or_compile(&store).await.unwrap();

        cache.reachable("A", &snapshot);
        cache.reachable("B", &snapshot);
        assert_eq!(cache.stats().reachable_entries, 1);
        assert_eq!(cache.stats().max_reachable, 1);
    }
}
