//! Role management service
//!
//! Every mutation runs the validator chain and the store write under one
//! lock, so the state a validator checks is the state the write applies to.

use crate::access::{AccessDecision, AccessPolicy, AccessRequest};
use crate::cache::{CacheStats, HierarchyCache, HierarchySnapshot};
use crate::config::{AuthzConfig, SeedRole};
use crate::decision::ensure_required_role;
use crate::error::{AuthzError, Result};
use crate::hierarchy::RoleHierarchy;
use crate::store::RoleStore;
use crate::types::{Role, RoleDraft, RoleId, RoleInput, RoleUpdate};
use crate::validation::{ValidationContext, ValidatorRegistry};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Role mutation and query façade over a [`RoleStore`]
pub struct RoleService {
    store: Arc<dyn RoleStore>,
    registry: Arc<ValidatorRegistry>,
    cache: HierarchyCache,
    write_lock: Mutex<()>,
}

impl RoleService {
    /// Service with the default role validators
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self::with_registry(store, Arc::new(ValidatorRegistry::role_defaults()))
    }

    pub fn with_registry(store: Arc<dyn RoleStore>, registry: Arc<ValidatorRegistry>) -> Self {
        Self {
            store,
            registry,
            cache: HierarchyCache::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Build from configuration and seed its roles
    pub async fn from_config(store: Arc<dyn RoleStore>, config: &AuthzConfig) -> Result<Self> {
        let mut service = Self::new(store);
        service.cache = HierarchyCache::with_capacity(config.reachable_cache_capacity);
        service.seed(&config.seed_roles).await?;
        Ok(service)
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Create a role
    pub async fn create_role(&self, input: RoleInput) -> Result<Role> {
        let _guard = self.write_lock.lock().await;

        let ctx = ValidationContext::new(self.store.as_ref());
        self.registry.validate_all(&input, &ctx).await?;

        let name = required_name(input.name)?;
        let parent = self.resolve_parent(input.parent_role.as_deref()).await?;

        let role = self
            .store
            .save(RoleDraft {
                id: None,
                name,
                parent,
            })
            .await?;
        self.cache.invalidate();

        info!("Created role '{}' (id {})", role.name, role.id);
        Ok(role)
    }

    /// Replace a role's name and parent
    pub async fn update_role(&self, update: RoleUpdate) -> Result<Role> {
        let _guard = self.write_lock.lock().await;

        let ctx = ValidationContext::new(self.store.as_ref());
        self.registry.validate_all(&update, &ctx).await?;

        let id = update
            .id
            .map(RoleId)
            .ok_or_else(|| AuthzError::InvalidInput("Role id is required".to_string()))?;
        if self.store.find_by_id(id).await?.is_none() {
            return Err(AuthzError::RoleNotFound(id.to_string()));
        }

        let name = required_name(update.name)?;
        let parent = self.resolve_parent(update.parent_role.as_deref()).await?;

        let role = self
            .store
            .save(RoleDraft {
                id: Some(id),
                name,
                parent,
            })
            .await?;
        self.cache.invalidate();

        info!("Updated role '{}' (id {})", role.name, role.id);
        Ok(role)
    }

    /// Delete a role no other role names as parent
    pub async fn delete_role(&self, id: RoleId) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let graph = self.store.snapshot().await?;
        let role = graph
            .get(id)
            .ok_or_else(|| AuthzError::RoleNotFound(id.to_string()))?;

        let dependents: Vec<String> = graph
            .children_of(id)
            .into_iter()
            .map(|child| child.name.clone())
            .collect();
        if !dependents.is_empty() {
            return Err(AuthzError::RoleInUse {
                name: role.name.clone(),
                dependents,
            });
        }

        self.store.delete_by_id(id).await?;
        self.cache.invalidate();

        info!("Deleted role '{}' (id {})", role.name, id);
        Ok(())
    }

    pub async fn get_role(&self, id: RoleId) -> Result<Role> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(id.to_string()))
    }

    pub async fn get_role_by_name(&self, name: &str) -> Result<Role> {
        self.store
            .find_by_name(name)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(name.to_string()))
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        self.store.find_all().await
    }

    /// Current compiled hierarchy
    pub async fn hierarchy(&self) -> Result<Arc<RoleHierarchy>> {
        Ok(self.snapshot().await?.into_hierarchy())
    }

    async fn snapshot(&self) -> Result<HierarchySnapshot> {
        self.cache.get_or_compile(self.store.as_ref()).await
    }

    /// Does `principal` hold `required` directly or through ancestry?
    pub async fn is_authorized(&self, principal: &str, required: &str) -> Result<bool> {
        let snapshot = self.snapshot().await?;
        ensure_required_role(required, &snapshot)?;

        let allowed = self.cache.reachable(principal, &snapshot).contains(required);
        debug!("is_authorized({}, {}) = {}", principal, required, allowed);
        Ok(allowed)
    }

    /// Evaluate a request against `policy` using the current hierarchy
    pub async fn authorize_request(
        &self,
        policy: &AccessPolicy,
        request: &AccessRequest,
    ) -> Result<AccessDecision> {
        let snapshot = self.snapshot().await?;
        policy.evaluate(request, &snapshot)
    }

    /// Create every seed role that does not exist yet
    ///
    /// Seeds may be listed in any order; a seed waits until its parent
    /// exists. Returns the roles created.
    pub async fn seed(&self, seeds: &[SeedRole]) -> Result<Vec<Role>> {
        let mut pending: Vec<&SeedRole> = Vec::new();
        for seed in seeds {
            if self.store.exists_by_name(&seed.name).await? {
                debug!("Seed role '{}' already present", seed.name);
            } else {
                pending.push(seed);
            }
        }

        let mut created = Vec::new();
        while !pending.is_empty() {
            let mut deferred = Vec::new();

            for seed in pending.iter().copied() {
                let ready = match &seed.parent {
                    Some(parent) => self.store.exists_by_name(parent).await?,
                    None => true,
                };
                if !ready {
                    deferred.push(seed);
                    continue;
                }

                let mut input = RoleInput::new(seed.name.clone());
                input.parent_role = seed.parent.clone();
                created.push(self.create_role(input).await?);
            }

            if deferred.len() == pending.len() {
                let names: Vec<&str> = deferred.iter().map(|s| s.name.as_str()).collect();
                return Err(AuthzError::Config(format!(
                    "Seed roles reference missing parents: {}",
                    names.join(", ")
                )));
            }
            pending = deferred;
        }

        if !created.is_empty() {
            info!("Seeded {} role(s)", created.len());
        }
        Ok(created)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn resolve_parent(&self, parent: Option<&str>) -> Result<Option<RoleId>> {
        match parent {
            Some(name) => self
                .store
                .find_by_name(name)
                .await?
                .map(|role| Some(role.id))
                .ok_or_else(|| AuthzError::RoleNotFound(name.to_string())),
            None => Ok(None),
        }
    }
}

/// Stored names carry no surrounding whitespace, matching [`NameKey`](crate::collation::NameKey)
fn required_name(name: Option<String>) -> Result<String> {
    name.map(|n| n.trim().to_string())
        .ok_or_else(|| AuthzError::InvalidInput("Role name is required".to_string()))
}
