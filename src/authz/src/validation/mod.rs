//! Specification validators and their registry
//!
//! A specification validator enforces one business invariant against a
//! mutation request. Validators are bound to the exact request type they
//! inspect and composed into an ordered, fail-fast chain.
//!
//! # Example
//!
//! ```rust
//! use roleguard_authz::validation::ValidatorRegistry;
//! use roleguard_authz::RoleInput;
//!
//! let registry = ValidatorRegistry::role_defaults();
//! assert_eq!(registry.validators_for::<RoleInput>().len(), 5);
//! ```

pub mod registry;
pub mod role;

use crate::error::Result;
use crate::store::RoleStore;
use async_trait::async_trait;

pub use registry::{
    RejectedBinding, TargetType, ValidatorBinding, ValidatorRegistry, ValidatorRegistryBuilder,
};
pub use role::{FieldConstraints, NameNotAlreadyTaken, NoCycle, ParentExistsIfPresent, ParentNotSelf};

/// Data a validator may consult while checking a request
///
/// Validators run inside the mutation's critical section, so everything they
/// read here is the state the mutation will be applied to.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub roles: &'a dyn RoleStore,
}

impl<'a> ValidationContext<'a> {
    pub fn new(roles: &'a dyn RoleStore) -> Self {
        Self { roles }
    }
}

/// Single-invariant validator for requests of type `T`
///
/// Implement this and bind it to `T` in a [`ValidatorRegistry`] to add a new
/// mutation invariant without touching existing validators.
#[async_trait]
pub trait SpecificationValidator<T: Sync>: Send + Sync {
    /// Label used in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Succeed, or fail with the error that should abort the mutation
    async fn validate(&self, dto: &T, ctx: &ValidationContext<'_>) -> Result<()>;
}
