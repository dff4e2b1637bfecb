//! Role graph invariants
//!
//! Each validator works for both [`RoleInput`](crate::RoleInput) and
//! [`RoleUpdate`](crate::RoleUpdate) through the [`RoleMutation`] view; the
//! create/update differences are decided on `RoleMutation::KIND`.

use super::registry::ValidatorRegistryBuilder;
use super::{SpecificationValidator, ValidationContext};
use crate::collation::primary_eq;
use crate::error::{AuthzError, Result};
use crate::types::{MutationKind, RoleMutation};
use async_trait::async_trait;
use tracing::warn;
use validator::{ValidationError, ValidationErrors};

/// Register the role validators for `T` in chain order
///
/// `ParentNotSelf` runs before `ParentExistsIfPresent` so a self-parented
/// request is reported as such even when the role does not exist yet.
pub fn register_role_validators<T: RoleMutation>(
    builder: ValidatorRegistryBuilder,
) -> ValidatorRegistryBuilder {
    builder
        .register::<T, _>(FieldConstraints)
        .register::<T, _>(ParentNotSelf)
        .register::<T, _>(ParentExistsIfPresent)
        .register::<T, _>(NameNotAlreadyTaken)
        .register::<T, _>(NoCycle)
}

/// Declarative field rules plus the non-blank name check, all violations
/// reported together
pub struct FieldConstraints;

#[async_trait]
impl<T: RoleMutation> SpecificationValidator<T> for FieldConstraints {
    fn name(&self) -> &'static str {
        "FieldConstraints"
    }

    async fn validate(&self, dto: &T, _ctx: &ValidationContext<'_>) -> Result<()> {
        let mut errors = dto.validate().err().unwrap_or_else(ValidationErrors::new);

        if let Some(name) = dto.name() {
            if !name.is_empty() && name.trim().is_empty() {
                let mut blank = ValidationError::new("blank");
                blank.message = Some("must not be blank".into());
                errors.add("name", blank);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(AuthzError::Validation(errors))
        }
    }
}

/// A named parent must exist
pub struct ParentExistsIfPresent;

#[async_trait]
impl<T: RoleMutation> SpecificationValidator<T> for ParentExistsIfPresent {
    fn name(&self) -> &'static str {
        "ParentExistsIfPresent"
    }

    async fn validate(&self, dto: &T, ctx: &ValidationContext<'_>) -> Result<()> {
        if let Some(parent) = dto.parent_role() {
            if !ctx.roles.exists_by_name(parent).await? {
                return Err(AuthzError::RoleNotFound(parent.to_string()));
            }
        }
        Ok(())
    }
}

/// A role cannot name itself as parent
pub struct ParentNotSelf;

#[async_trait]
impl<T: RoleMutation> SpecificationValidator<T> for ParentNotSelf {
    fn name(&self) -> &'static str {
        "ParentNotSelf"
    }

    async fn validate(&self, dto: &T, _ctx: &ValidationContext<'_>) -> Result<()> {
        if let (Some(name), Some(parent)) = (dto.name(), dto.parent_role()) {
            if primary_eq(name, parent) {
                return Err(AuthzError::SelfParent {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// No other role may already hold the name
pub struct NameNotAlreadyTaken;

#[async_trait]
impl<T: RoleMutation> SpecificationValidator<T> for NameNotAlreadyTaken {
    fn name(&self) -> &'static str {
        "NameNotAlreadyTaken"
    }

    async fn validate(&self, dto: &T, ctx: &ValidationContext<'_>) -> Result<()> {
        let Some(name) = dto.name() else {
            return Ok(());
        };

        let taken = match T::KIND {
            MutationKind::Create => ctx.roles.exists_by_name(name).await?,
            MutationKind::Update => match ctx.roles.find_by_name(name).await? {
                Some(holder) => Some(holder.id) != dto.target_id(),
                None => false,
            },
        };

        if taken {
            return Err(AuthzError::NameConflict(name.to_string()));
        }
        Ok(())
    }
}

/// The proposed parent chain must not reach the role being defined
///
/// Creates compare by name (the role has no id yet); updates compare by id.
/// The walk is bounded by the graph size, and a chain that does not end
/// within that bound is reported as a cycle too.
pub struct NoCycle;

#[async_trait]
impl<T: RoleMutation> SpecificationValidator<T> for NoCycle {
    fn name(&self) -> &'static str {
        "NoCycle"
    }

    async fn validate(&self, dto: &T, ctx: &ValidationContext<'_>) -> Result<()> {
        let Some(parent_name) = dto.parent_role() else {
            return Ok(());
        };

        let graph = ctx.roles.snapshot().await?;
        let Some(parent) = graph.find_by_name(parent_name) else {
            return Ok(());
        };

        let subject = match T::KIND {
            MutationKind::Create => match dto.name() {
                Some(name) => name.to_string(),
                None => return Ok(()),
            },
            MutationKind::Update => {
                match dto.target_id().and_then(|id| graph.get(id)) {
                    Some(current) => current.name.clone(),
                    None => return Ok(()),
                }
            }
        };

        let cycle = || AuthzError::Cycle {
            name: subject.clone(),
            parent: parent.name.clone(),
        };

        let mut walk = graph.ancestors(parent.id);
        for ancestor in walk.by_ref() {
            let reached = match T::KIND {
                MutationKind::Create => primary_eq(&ancestor.name, &subject),
                MutationKind::Update => Some(ancestor.id) == dto.target_id(),
            };
            if reached {
                return Err(cycle());
            }
        }

        if walk.exceeded_bound() {
            warn!(
                "Parent chain above '{}' does not terminate within {} roles",
                parent.name,
                graph.len()
            );
            return Err(cycle());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRoleStore;
    use crate::types::{Role, RoleId, RoleInput, RoleUpdate};

    fn seeded() -> InMemoryRoleStore {
        InMemoryRoleStore::with_roles(vec![
            Role::new(RoleId(1), "ADMIN"),
            Role::new(RoleId(2), "EMPLOYEE").with_parent(RoleId(1)),
            Role::new(RoleId(3), "USER").with_parent(RoleId(2)),
        ])
    }

    async fn check<T, V>(validator: V, dto: &T, store: &InMemoryRoleStore) -> Result<()>
    where
        T: RoleMutation,
        V: SpecificationValidator<T>,
    {
        validator.validate(dto, &ValidationContext::new(store)).await
    }

    #[tokio::test]
    async fn test_field_constraints_aggregate() {
        let store = seeded();
        let dto = RoleUpdate {
            id: Some(0),
            name: None,
            parent_role: None,
        };

        match check(FieldConstraints, &dto, &store).await {
            Err(AuthzError::Validation(errors)) => {
                let fields = errors.field_errors();
                assert!(fields.contains_key("id"));
                assert!(fields.contains_key("name"));
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_field_constraints_blank_name() {
        let store = seeded();
        let result = check(FieldConstraints, &RoleInput::new("   "), &store).await;
        assert!(matches!(result, Err(AuthzError::Validation(_))));

        check(FieldConstraints, &RoleInput::new("TestRole"), &store)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_parent_exists() {
        let store = seeded();
        check(ParentExistsIfPresent, &RoleInput::new("X").with_parent("admin"), &store)
            .await
            .unwrap();
        check(ParentExistsIfPresent, &RoleInput::new("X"), &store)
            .await
            .unwrap();

        let result = check(
            ParentExistsIfPresent,
            &RoleInput::new("X").with_parent("ROLE_DOES_NOT_EXIST"),
            &store,
        )
        .await;
        assert!(matches!(result, Err(AuthzError::RoleNotFound(name)) if name == "ROLE_DOES_NOT_EXIST"));
    }

    #[tokio::test]
    async fn test_parent_not_self() {
        let store = seeded();
        let result = check(
            ParentNotSelf,
            &RoleInput::new("ROLE_ADMIN").with_parent("role_admin"),
            &store,
        )
        .await;
        assert!(matches!(result, Err(AuthzError::SelfParent { .. })));

        let result = check(
            ParentNotSelf,
            &RoleUpdate::new(RoleId(1), "Gérant").with_parent("GERANT"),
            &store,
        )
        .await;
        assert!(matches!(result, Err(AuthzError::SelfParent { .. })));

        check(ParentNotSelf, &RoleInput::new("X").with_parent("ADMIN"), &store)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_name_taken_on_create() {
        let store = seeded();
        let result = check(NameNotAlreadyTaken, &RoleInput::new("Employee"), &store).await;
        assert!(matches!(result, Err(AuthzError::NameConflict(_))));

        check(NameNotAlreadyTaken, &RoleInput::new("GUEST"), &store)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_name_taken_on_update() {
        let store = seeded();
        check(NameNotAlreadyTaken, &RoleUpdate::new(RoleId(2), "employee"), &store)
            .await
            .unwrap();

        let result = check(NameNotAlreadyTaken, &RoleUpdate::new(RoleId(3), "EMPLOYEE"), &store).await;
        assert!(matches!(result, Err(AuthzError::NameConflict(_))));
    }

    #[tokio::test]
    async fn test_no_cycle_on_update() {
        let store = seeded();

        // ADMIN -> EMPLOYEE -> USER; making USER the parent of ADMIN closes the loop
        let result = check(NoCycle, &RoleUpdate::new(RoleId(1), "ADMIN").with_parent("USER"), &store).await;
        match result {
            Err(AuthzError::Cycle { name, parent }) => {
                assert_eq!(name, "ADMIN");
                assert_eq!(parent, "USER");
            }
            other => panic!("Expected Cycle error, got {:?}", other),
        }

        check(NoCycle, &RoleUpdate::new(RoleId(3), "USER").with_parent("ADMIN"), &store)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_cycle_on_create_compares_names() {
        let store = InMemoryRoleStore::with_roles(vec![
            Role::new(RoleId(1), "MANAGER"),
            Role::new(RoleId(2), "LEAD").with_parent(RoleId(1)),
        ]);

        let result = check(NoCycle, &RoleInput::new("manager").with_parent("LEAD"), &store).await;
        assert!(matches!(result, Err(AuthzError::Cycle { .. })));

        check(NoCycle, &RoleInput::new("DEV").with_parent("LEAD"), &store)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_cycle_terminates_on_malformed_graph() {
        let store = InMemoryRoleStore::with_roles(vec![
            Role::new(RoleId(1), "A").with_parent(RoleId(2)),
            Role::new(RoleId(2), "B").with_parent(RoleId(1)),
            Role::new(RoleId(3), "C"),
        ]);

        let result = check(NoCycle, &RoleInput::new("D").with_parent("A"), &store).await;
        assert!(matches!(result, Err(AuthzError::Cycle { .. })));

        check(NoCycle, &RoleUpdate::new(RoleId(3), "C").with_parent("A"), &store)
            .await
            .unwrap_err();
    }

    #[tokio::test]
    async fn test_no_cycle_skips_missing_parent_or_target() {
        let store = seeded();
        check(NoCycle, &RoleInput::new("X").with_parent("NOPE"), &store)
            .await
            .unwrap();
        check(NoCycle, &RoleUpdate::new(RoleId(99), "X").with_parent("USER"), &store)
            .await
            .unwrap();
    }
}
