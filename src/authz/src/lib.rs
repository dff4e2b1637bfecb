//! # Roleguard Authorization Core
//!
//! Role-based authorization with an acyclic role hierarchy.
//!
//! ## Features
//!
//! - **Role graph** kept acyclic by a pluggable validator chain
//! - **Validator registry** keyed by the exact request type
//! - **Hierarchy compiler** flattening parent links into `PARENT > CHILD` edges
//! - **Multi-method path matching** for request-level access rules
//! - **Decision point** answering "does role A imply role B"
//!
//! ## Example
//!
//! ```rust
//! use roleguard_authz::{InMemoryRoleStore, RoleInput, RoleService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RoleService::new(Arc::new(InMemoryRoleStore::new()));
//!
//!     service.create_role(RoleInput::new("ADMIN")).await?;
//!     service.create_role(RoleInput::new("USER").with_parent("ADMIN")).await?;
//!
//!     assert!(service.is_authorized("ADMIN", "USER").await?);
//!     assert!(!service.is_authorized("USER", "ADMIN").await?);
//!
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod cache;
pub mod collation;
pub mod config;
pub mod decision;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod matcher;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use access::{AccessDecision, AccessPolicy, AccessRequest, AccessRule, Requirement, RuleDeclaration};
pub use cache::{CacheStats, HierarchyCache, HierarchySnapshot};
pub use config::{AuthzConfig, SeedRole};
pub use decision::is_authorized;
pub use error::{AuthzError, ErrorKind, Result};
pub use graph::RoleGraph;
pub use hierarchy::{HierarchyEdge, RoleHierarchy};
pub use matcher::{MultiMethodMatcher, PathPattern, PatternError};
pub use service::RoleService;
pub use store::{InMemoryRoleStore, RoleStore};
pub use types::{Role, RoleDraft, RoleId, RoleInput, RoleUpdate};
pub use validation::{SpecificationValidator, ValidationContext, ValidatorRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
