//! Core role types and mutation requests

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Unique role identifier assigned by the role store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub i64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted role node
///
/// The parent is held as an id into the store, never as an embedded role,
/// so the graph carries no ownership cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Store-assigned identifier
    pub id: RoleId,

    /// Role name (unique under primary-strength comparison)
    pub name: String,

    /// Parent role, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RoleId>,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: RoleId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Role record not yet persisted; the store assigns the id on save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDraft {
    /// Present when overwriting an existing role
    pub id: Option<RoleId>,
    pub name: String,
    pub parent: Option<RoleId>,
}

/// Create-role request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RoleInput {
    #[validate(required, length(min = 1, max = 64))]
    pub name: Option<String>,

    #[serde(default, alias = "parentRole")]
    pub parent_role: Option<String>,
}

impl RoleInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            parent_role: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_role = Some(parent.into());
        self
    }
}

/// Update-role request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RoleUpdate {
    #[validate(required, range(min = 1))]
    pub id: Option<i64>,

    #[validate(required, length(min = 1, max = 64))]
    pub name: Option<String>,

    #[serde(default, alias = "parentRole")]
    pub parent_role: Option<String>,
}

impl RoleUpdate {
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.0),
            name: Some(name.into()),
            parent_role: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_role = Some(parent.into());
        self
    }
}

/// Whether a mutation defines a new role or rewrites an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
}

/// Common view over role mutation requests, shared by the role validators
pub trait RoleMutation: Validate + Send + Sync + 'static {
    const KIND: MutationKind;

    fn name(&self) -> Option<&str>;

    fn parent_role(&self) -> Option<&str>;

    /// Id of the role being rewritten; always `None` for creates
    fn target_id(&self) -> Option<RoleId>;
}

impl RoleMutation for RoleInput {
    const KIND: MutationKind = MutationKind::Create;

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn parent_role(&self) -> Option<&str> {
        self.parent_role.as_deref()
    }

    fn target_id(&self) -> Option<RoleId> {
        None
    }
}

impl RoleMutation for RoleUpdate {
    const KIND: MutationKind = MutationKind::Update;

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn parent_role(&self) -> Option<&str> {
        self.parent_role.as_deref()
    }

    fn target_id(&self) -> Option<RoleId> {
        self.id.map(RoleId)
    }
}
