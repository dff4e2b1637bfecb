//! Validator registry keyed by request type
//!
//! Validators are registered together with the concrete request type they
//! inspect. Lookup is by exact type identity (`TypeId`), and the order within
//! a type is registration order.

use super::{SpecificationValidator, ValidationContext};
use crate::error::Result;
use crate::types::{RoleInput, RoleUpdate};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type ErasedValidator = Box<dyn Any + Send + Sync>;

fn holds_validator_for<T: Sync + 'static>(instance: &(dyn Any + Send + Sync + 'static)) -> bool {
    instance.is::<Arc<dyn SpecificationValidator<T>>>()
}

/// Type tag naming the request type a validator targets
#[derive(Clone, Copy)]
pub struct TargetType {
    id: TypeId,
    name: &'static str,
    accepts: fn(&(dyn Any + Send + Sync + 'static)) -> bool,
}

impl TargetType {
    pub fn of<T: Sync + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            accepts: holds_validator_for::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TargetType").field(&self.name).finish()
    }
}

impl PartialEq for TargetType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A validator instance paired with the request type it targets
pub struct ValidatorBinding {
    target: TargetType,
    label: String,
    instance: ErasedValidator,
}

impl ValidatorBinding {
    /// Typed binding; always accepted
    pub fn new<T, V>(validator: V) -> Self
    where
        T: Sync + 'static,
        V: SpecificationValidator<T> + 'static,
    {
        let label = SpecificationValidator::<T>::name(&validator).to_string();
        let validator: Arc<dyn SpecificationValidator<T>> = Arc::new(validator);
        Self {
            target: TargetType::of::<T>(),
            label,
            instance: Box::new(validator),
        }
    }

    /// Type-erased binding, as produced by a plugin list or other dynamic
    /// source. `instance` must be an `Arc<dyn SpecificationValidator<T>>`
    /// for the declared target or the registry rejects it.
    pub fn erased(target: TargetType, label: impl Into<String>, instance: ErasedValidator) -> Self {
        Self {
            target,
            label: label.into(),
            instance,
        }
    }

    pub fn target(&self) -> TargetType {
        self.target
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Binding excluded at registration time
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedBinding {
    pub label: String,
    pub target: &'static str,
    pub reason: String,
}

struct RegisteredValidator {
    label: String,
    instance: ErasedValidator,
}

/// Registry of specification validators indexed by target type
#[derive(Default)]
pub struct ValidatorRegistry {
    by_target: HashMap<TypeId, Vec<RegisteredValidator>>,
    rejected: Vec<RejectedBinding>,
}

impl ValidatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ValidatorRegistryBuilder {
        ValidatorRegistryBuilder::new()
    }

    /// Registry holding the role invariants for both create and update
    pub fn role_defaults() -> Self {
        super::role::register_role_validators::<RoleInput>(Self::builder())
            .and_then_register(super::role::register_role_validators::<RoleUpdate>)
            .build()
    }

    /// Register a binding, rejecting it if the instance does not implement
    /// the validation capability for its declared target
    pub fn bind(&mut self, binding: ValidatorBinding) {
        let ValidatorBinding {
            target,
            label,
            instance,
        } = binding;

        if !(target.accepts)(&*instance) {
            let reason = format!(
                "The validator {} does not implement SpecificationValidator<{}>",
                label, target.name
            );
            error!("{}", reason);
            self.rejected.push(RejectedBinding {
                label,
                target: target.name,
                reason,
            });
            return;
        }

        info!("Found validator {} for {}", label, target.name);
        self.by_target
            .entry(target.id)
            .or_default()
            .push(RegisteredValidator { label, instance });
    }

    /// Validators bound to exactly `T`, in registration order
    pub fn validators_for<T: Sync + 'static>(&self) -> Vec<Arc<dyn SpecificationValidator<T>>> {
        self.by_target
            .get(&TypeId::of::<T>())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        entry
                            .instance
                            .downcast_ref::<Arc<dyn SpecificationValidator<T>>>()
                            .cloned()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Labels of the validators bound to `T`, in registration order
    pub fn labels_for<T: Sync + 'static>(&self) -> Vec<&str> {
        self.by_target
            .get(&TypeId::of::<T>())
            .map(|entries| entries.iter().map(|e| e.label.as_str()).collect())
            .unwrap_or_default()
    }

    /// Run every validator bound to `T`; the first failure aborts the chain
    /// and is returned unchanged
    pub async fn validate_all<T: Sync + 'static>(
        &self,
        dto: &T,
        ctx: &ValidationContext<'_>,
    ) -> Result<()> {
        for validator in self.validators_for::<T>() {
            debug!("Running validator {}", validator.name());
            if let Err(e) = validator.validate(dto, ctx).await {
                warn!("Validator {} rejected request: {}", validator.name(), e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Bindings excluded at registration time
    pub fn rejected(&self) -> &[RejectedBinding] {
        &self.rejected
    }

    /// Total number of accepted validators across all targets
    pub fn len(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Startup-time registration list
#[derive(Default)]
pub struct ValidatorRegistryBuilder {
    bindings: Vec<ValidatorBinding>,
}

impl ValidatorRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `validator` to request type `T`
    pub fn register<T, V>(mut self, validator: V) -> Self
    where
        T: Sync + 'static,
        V: SpecificationValidator<T> + 'static,
    {
        self.bindings.push(ValidatorBinding::new::<T, V>(validator));
        self
    }

    /// Add a pre-built (possibly type-erased) binding
    pub fn bind(mut self, binding: ValidatorBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Apply a registration function, for grouping related validators
    pub fn and_then_register(self, f: impl FnOnce(Self) -> Self) -> Self {
        f(self)
    }

    pub fn build(self) -> ValidatorRegistry {
        let mut registry = ValidatorRegistry::new();
        for binding in self.bindings {
            registry.bind(binding);
        }
        if !registry.rejected.is_empty() {
            warn!(
                "{} validator binding(s) rejected at registration",
                registry.rejected.len()
            );
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthzError;
    use crate::store::InMemoryRoleStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ticket {
        title: String,
    }

    #[derive(Debug)]
    struct Comment;

    struct TitleNotEmpty;

    #[async_trait]
    impl SpecificationValidator<Ticket> for TitleNotEmpty {
        fn name(&self) -> &'static str {
            "TitleNotEmpty"
        }

        async fn validate(&self, dto: &Ticket, _ctx: &ValidationContext<'_>) -> Result<()> {
            if dto.title.is_empty() {
                return Err(AuthzError::InvalidInput("title is empty".to_string()));
            }
            Ok(())
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl SpecificationValidator<Ticket> for Counting {
        fn name(&self) -> &'static str {
            "Counting"
        }

        async fn validate(&self, _dto: &Ticket, _ctx: &ValidationContext<'_>) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_lookup_by_exact_type() {
        let registry = ValidatorRegistry::builder()
            .register::<Ticket, _>(TitleNotEmpty)
            .build();

        assert_eq!(registry.validators_for::<Ticket>().len(), 1);
        assert!(registry.validators_for::<Comment>().is_empty());
        assert!(registry.rejected().is_empty());
    }

    #[test]
    fn test_registration_order_is_kept() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ValidatorRegistry::builder()
            .register::<Ticket, _>(Counting(counter.clone()))
            .register::<Ticket, _>(TitleNotEmpty)
            .build();

        assert_eq!(registry.labels_for::<Ticket>(), vec!["Counting", "TitleNotEmpty"]);
    }

    #[tokio::test]
    async fn test_fail_fast() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ValidatorRegistry::builder()
            .register::<Ticket, _>(TitleNotEmpty)
            .register::<Ticket, _>(Counting(counter.clone()))
            .build();

        let store = InMemoryRoleStore::new();
        let ctx = ValidationContext::new(&store);

        let bad = Ticket { title: String::new() };
        let result = registry.validate_all(&bad, &ctx).await;
        assert!(matches!(result, Err(AuthzError::InvalidInput(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let good = Ticket { title: "ok".to_string() };
        registry.validate_all(&good, &ctx).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mismatched_binding_is_rejected() {
        let wrong: Arc<dyn SpecificationValidator<Ticket>> = Arc::new(TitleNotEmpty);
        let not_a_validator = String::from("plain value");

        let registry = ValidatorRegistry::builder()
            .bind(ValidatorBinding::erased(
                TargetType::of::<Comment>(),
                "TitleNotEmpty",
                Box::new(wrong),
            ))
            .bind(ValidatorBinding::erased(
                TargetType::of::<Ticket>(),
                "PlainString",
                Box::new(not_a_validator),
            ))
            .register::<Ticket, _>(TitleNotEmpty)
            .build();

        assert_eq!(registry.rejected().len(), 2);
        assert_eq!(registry.rejected()[0].label, "TitleNotEmpty");
        assert!(registry.rejected()[1].reason.contains("PlainString"));
        assert!(registry.validators_for::<Comment>().is_empty());
        assert_eq!(registry.validators_for::<Ticket>().len(), 1);
    }

    #[test]
    fn test_role_defaults() {
        let registry = ValidatorRegistry::role_defaults();
        assert_eq!(registry.len(), 10);
        assert!(registry.rejected().is_empty());

        let expected = vec![
            "FieldConstraints",
            "ParentNotSelf",
            "ParentExistsIfPresent",
            "NameNotAlreadyTaken",
            "NoCycle",
        ];
        assert_eq!(registry.labels_for::<RoleInput>(), expected);
        assert_eq!(registry.labels_for::<RoleUpdate>(), expected);
    }
}
