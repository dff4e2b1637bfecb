//! Error types for role management and authorization

use crate::matcher::PatternError;
use thiserror::Error;
use validator::ValidationErrors;

/// Role authorization errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Field-level constraint violations, aggregated
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Referenced role (by id or name) does not exist
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// Role names itself as parent
    #[error("Role '{name}' cannot be its own parent")]
    SelfParent { name: String },

    /// Proposed parent chain reaches the role being defined
    #[error("Role '{name}' cannot be a sub role of itself (via parent '{parent}')")]
    Cycle { name: String, parent: String },

    /// Name already held by a different role
    #[error("Role with name {0} already exists")]
    NameConflict(String),

    /// Role still referenced as parent by other roles
    #[error("Role '{name}' is parent of: {}", dependents.join(", "))]
    RoleInUse { name: String, dependents: Vec<String> },

    /// Required role unknown to the compiled hierarchy
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid path pattern in an access rule
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Role store failure
    #[error("Store error: {0}")]
    Store(String),
}

/// Stable error codes for mapping errors to host responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    RoleNotFound,
    SelfParent,
    Cycle,
    NameConflict,
    RoleInUse,
    UnknownRole,
    InvalidInput,
    InvalidPattern,
    Config,
    Store,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_failed",
            Self::RoleNotFound => "role_not_found",
            Self::SelfParent => "role_self_parent",
            Self::Cycle => "role_cycle",
            Self::NameConflict => "role_name_conflict",
            Self::RoleInUse => "role_in_use",
            Self::UnknownRole => "unknown_role",
            Self::InvalidInput => "invalid_input",
            Self::InvalidPattern => "invalid_pattern",
            Self::Config => "config_error",
            Self::Store => "store_error",
        }
    }
}

impl AuthzError {
    /// Error kind, distinguishable without inspecting the message
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RoleNotFound(_) => ErrorKind::RoleNotFound,
            Self::SelfParent { .. } => ErrorKind::SelfParent,
            Self::Cycle { .. } => ErrorKind::Cycle,
            Self::NameConflict(_) => ErrorKind::NameConflict,
            Self::RoleInUse { .. } => ErrorKind::RoleInUse,
            Self::UnknownRole(_) => ErrorKind::UnknownRole,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InvalidPattern(_) => ErrorKind::InvalidPattern,
            Self::Config(_) => ErrorKind::Config,
            Self::Store(_) => ErrorKind::Store,
        }
    }
}

/// Result type for role authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
