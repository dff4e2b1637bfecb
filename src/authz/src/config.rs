//! Authorization configuration
//!
//! Environment variables:
//! - `ROLEGUARD_CACHE_SIZE` - memoized reachable-set capacity (default: 10000)
//! - `ROLEGUARD_SEED_HIERARCHY` - roles to seed, comma separated; each entry
//!   is `NAME` or `PARENT > CHILD` (default: `ADMIN > EMPLOYEE > USER > GUEST` chain)
//! - `ROLEGUARD_RULES` - JSON array of rule declarations (default: built-in API rules)

use crate::access::{AccessPolicy, RuleDeclaration};
use crate::cache::DEFAULT_REACHABLE_CAPACITY;
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};

/// Role created at startup when absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRole {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl SeedRole {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn child(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Maximum memoized reachable-role sets
    pub reachable_cache_capacity: usize,

    /// Roles to seed, parents before children
    pub seed_roles: Vec<SeedRole>,

    /// Access rules, first match wins
    pub rules: Vec<RuleDeclaration>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            reachable_cache_capacity: DEFAULT_REACHABLE_CAPACITY,
            seed_roles: vec![
                SeedRole::root("ADMIN"),
                SeedRole::child("EMPLOYEE", "ADMIN"),
                SeedRole::child("USER", "EMPLOYEE"),
                SeedRole::child("GUEST", "USER"),
            ],
            rules: AccessPolicy::default_declarations(),
        }
    }
}

impl AuthzConfig {
    /// Load from `ROLEGUARD_*` environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(size) = lookup("ROLEGUARD_CACHE_SIZE").and_then(|s| s.trim().parse().ok()) {
            config.reachable_cache_capacity = size;
        }

        if let Some(seeds) = lookup("ROLEGUARD_SEED_HIERARCHY") {
            config.seed_roles = parse_seed_hierarchy(&seeds)?;
        }

        if let Some(rules) = lookup("ROLEGUARD_RULES") {
            config.rules = serde_json::from_str(&rules)
                .map_err(|e| AuthzError::Config(format!("ROLEGUARD_RULES: {}", e)))?;
        }

        Ok(config)
    }

    /// Parse a JSON document; absent fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AuthzError::Config(e.to_string()))
    }

    pub fn access_policy(&self) -> Result<AccessPolicy> {
        AccessPolicy::from_declarations(self.rules.iter().cloned())
    }
}

/// Parse `"ADMIN > EMPLOYEE, EMPLOYEE > USER, AUDITOR"` into seed roles
pub fn parse_seed_hierarchy(input: &str) -> Result<Vec<SeedRole>> {
    let mut seeds: Vec<SeedRole> = Vec::new();

    for entry in input.split([',', '\n']).map(str::trim).filter(|e| !e.is_empty()) {
        let (parent, child) = match entry.split_once('>') {
            Some((parent, child)) => (Some(parent.trim()), child.trim()),
            None => (None, entry),
        };

        if child.is_empty() || parent.is_some_and(str::is_empty) || child.contains('>') {
            return Err(AuthzError::Config(format!(
                "Invalid seed hierarchy entry: '{}'",
                entry
            )));
        }

        if let Some(parent) = parent {
            if !seeds.iter().any(|s| s.name == parent) {
                seeds.push(SeedRole::root(parent));
            }
        }

        match seeds.iter().position(|s| s.name == child) {
            Some(idx) if seeds[idx].parent.is_none() => {
                seeds[idx].parent = parent.map(str::to_string);
            }
            Some(idx) if parent.is_some() && seeds[idx].parent.as_deref() != parent => {
                return Err(AuthzError::Config(format!(
                    "Role '{}' has more than one parent",
                    child
                )));
            }
            Some(_) => {}
            None => seeds.push(SeedRole {
                name: child.to_string(),
                parent: parent.map(str::to_string),
            }),
        }
    }

    Ok(seeds)
}
