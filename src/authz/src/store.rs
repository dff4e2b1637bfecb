//! Role storage

use crate::collation::NameKey;
use crate::error::Result;
use crate::graph::RoleGraph;
use crate::types::{Role, RoleDraft, RoleId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Role store trait
///
/// Plain CRUD. Name lookups use primary-strength comparison. Implementations
/// are not expected to enforce name uniqueness or acyclicity; the validator
/// chain does that before anything reaches `save`.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Get a role by id
    async fn find_by_id(&self, id: RoleId) -> Result<Option<Role>>;

    /// Get a role by name
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Check whether a role with this name exists
    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        Ok(self.find_by_name(name).await?.is_some())
    }

    /// Insert (no id) or overwrite (with id) a role
    async fn save(&self, draft: RoleDraft) -> Result<Role>;

    /// Delete a role; deleting a missing id is a no-op
    async fn delete_by_id(&self, id: RoleId) -> Result<()>;

    /// List all roles in id order
    async fn find_all(&self) -> Result<Vec<Role>>;

    /// Arena snapshot of the current graph
    async fn snapshot(&self) -> Result<RoleGraph> {
        Ok(RoleGraph::from_roles(self.find_all().await?))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    roles: BTreeMap<RoleId, Role>,
    last_id: i64,
}

/// In-memory role store implementation
pub struct InMemoryRoleStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryRoleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Create a store holding these records verbatim (no validation)
    pub fn with_roles(roles: Vec<Role>) -> Self {
        let last_id = roles.iter().map(|r| r.id.0).max().unwrap_or(0);
        let roles = roles.into_iter().map(|r| (r.id, r)).collect();
        Self {
            state: Arc::new(RwLock::new(StoreState { roles, last_id })),
        }
    }
}

impl Default for InMemoryRoleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn find_by_id(&self, id: RoleId) -> Result<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let key = NameKey::new(name);
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .find(|role| NameKey::new(&role.name) == key)
            .cloned())
    }

    async fn save(&self, draft: RoleDraft) -> Result<Role> {
        let mut state = self.state.write().await;
        let id = match draft.id {
            Some(id) => {
                state.last_id = state.last_id.max(id.0);
                id
            }
            None => {
                state.last_id += 1;
                RoleId(state.last_id)
            }
        };

        let role = Role {
            id,
            name: draft.name,
            parent: draft.parent,
        };
        state.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn delete_by_id(&self, id: RoleId) -> Result<()> {
        let mut state = self.state.write().await;
        state.roles.remove(&id);
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.values().cloned().collect())
    }
}
