//! Configuration validation
//!
//! Checks a configuration's shape and that every component it names exists
//! in a [`Catalog`] under the right kind, and that its aliases resolve
//! without a cycle. Nothing is instantiated.

use crate::alias::AliasGraph;
use crate::catalog::{Catalog, ComponentKind};
use crate::config::ServiceConfig;
use crate::factory::{AbstractFactoryRef, InitializerRef};
use crate::{LAZY_SERVICE_DELEGATOR, Result};
use ahash::RandomState;
use serde_json::Value;
use std::collections::HashMap;

#[cfg(feature = "logging")]
use tracing::debug;

/// Validates configuration against a catalog.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use service_locator::{Catalog, ConfigValidator};
///
/// let catalog = Catalog::new();
/// let validator = ConfigValidator::new(&catalog);
///
/// assert!(validator.is_valid_configuration(&json!({
///     "factories": { "Clock": "InvokableFactory" }
/// })));
/// assert!(!validator.is_valid_configuration(&json!({
///     "factories": { "Clock": "NoSuchFactory" }
/// })));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConfigValidator<'a> {
    catalog: &'a Catalog,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Fail with `InvalidConfiguration` on the first problem in `raw`.
    pub fn assert_is_valid_configuration(&self, raw: &Value) -> Result<()> {
        let config = ServiceConfig::from_json(raw)?;
        self.assert_is_valid(&config)
    }

    /// Whether `raw` would pass [`assert_is_valid_configuration`](Self::assert_is_valid_configuration).
    pub fn is_valid_configuration(&self, raw: &Value) -> bool {
        match self.assert_is_valid_configuration(raw) {
            Ok(()) => true,
            Err(_e) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_locator",
                    error = %_e,
                    "Configuration rejected"
                );
                false
            }
        }
    }

    /// Check every catalog reference of an already parsed configuration.
    pub fn assert_is_valid(&self, config: &ServiceConfig) -> Result<()> {
        for (name, factory) in &config.factories {
            if let Some(factory) = factory.name() {
                self.catalog
                    .require(ComponentKind::Factory, factory, &format!("factories.{name}"))?;
            }
        }

        for (name, class) in &config.invokables {
            self.catalog
                .require(ComponentKind::Invokable, class, &format!("invokables.{name}"))?;
        }

        for (name, delegators) in &config.delegators {
            for delegator in delegators {
                match delegator.name() {
                    Some(LAZY_SERVICE_DELEGATOR) | None => {}
                    Some(delegator) => self.catalog.require(
                        ComponentKind::Delegator,
                        delegator,
                        &format!("delegators.{name}"),
                    )?,
                }
            }
        }

        for factory in &config.abstract_factories {
            if let AbstractFactoryRef::Named(factory) = factory {
                self.catalog
                    .require(ComponentKind::AbstractFactory, factory, "abstract_factories")?;
            }
        }

        for initializer in &config.initializers {
            if let InitializerRef::Named(initializer) = initializer {
                self.catalog
                    .require(ComponentKind::Initializer, initializer, "initializers")?;
            }
        }

        Self::assert_acyclic_aliases(config)
    }

    /// Resolve the configuration's own aliases, including the ones its
    /// invokables imply, and fail with `CyclicAlias` on a cycle.
    fn assert_acyclic_aliases(config: &ServiceConfig) -> Result<()> {
        let mut proposed: HashMap<String, String, RandomState> = config
            .invokables
            .iter()
            .filter(|(name, class)| name != class)
            .map(|(name, class)| (name.clone(), class.clone()))
            .collect();
        proposed.extend(config.aliases.iter().map(|(a, t)| (a.clone(), t.clone())));

        if !proposed.is_empty() {
            AliasGraph::bulk_resolve(&proposed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AbstractFactory, Container, DiError, Instance, Invokable, Options};
    use serde_json::json;

    struct Clock;

    impl Invokable for Clock {
        fn invoke(_: Option<&Options>) -> Result<Self> {
            Ok(Clock)
        }
    }

    struct Reflective;

    impl AbstractFactory for Reflective {
        fn can_create(&self, _: &Container, _: &str) -> bool {
            false
        }

        fn create(&self, _: &Container, name: &str, _: Option<&Options>) -> Result<Instance> {
            Err(DiError::not_found(name))
        }
    }

    fn catalog() -> Catalog {
        Catalog::new()
            .with_invokable::<Clock>("Clock")
            .with_abstract_factory("Reflective", || Reflective)
    }

    #[test]
    fn test_valid_configuration() {
        let catalog = catalog();
        let validator = ConfigValidator::new(&catalog);

        validator
            .assert_is_valid_configuration(&json!({
                "invokables": { "clock": "Clock" },
                "factories": { "Clock": "InvokableFactory" },
                "delegators": { "Clock": ["LazyServiceFactory"] },
                "abstract_factories": ["Reflective"]
            }))
            .unwrap();
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let catalog = catalog();
        let validator = ConfigValidator::new(&catalog);

        // A known name registered as a different kind
        let err = validator
            .assert_is_valid_configuration(&json!({ "factories": { "X": "Reflective" } }))
            .unwrap_err();
        assert!(matches!(err, DiError::InvalidConfiguration { ref key, .. } if key == "factories.X"));

        let err = validator
            .assert_is_valid_configuration(&json!({ "initializers": ["Clock"] }))
            .unwrap_err();
        assert!(matches!(err, DiError::InvalidConfiguration { ref key, .. } if key == "initializers"));
    }

    #[test]
    fn test_unknown_invokable_and_delegator() {
        let catalog = catalog();
        let validator = ConfigValidator::new(&catalog);

        assert!(!validator.is_valid_configuration(&json!({ "invokables": { "x": "Ghost" } })));
        assert!(!validator.is_valid_configuration(&json!({ "delegators": { "x": ["Ghost"] } })));
        assert!(!validator.is_valid_configuration(&json!({ "aliases": 5 })));
    }

    #[test]
    fn test_alias_cycles_are_rejected() {
        let catalog = catalog();
        let validator = ConfigValidator::new(&catalog);

        assert!(!validator.is_valid_configuration(&json!({ "aliases": { "a": "b", "b": "a" } })));
        assert!(!validator.is_valid_configuration(&json!({ "aliases": { "a": "a" } })));

        // The alias implied by an invokable closes the loop
        let err = validator
            .assert_is_valid_configuration(&json!({
                "invokables": { "clock": "Clock" },
                "aliases": { "Clock": "clock" }
            }))
            .unwrap_err();
        let DiError::CyclicAlias { cycle } = err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert!(cycle.iter().any(|n| n == "clock"));
        assert!(cycle.iter().any(|n| n == "Clock"));

        assert!(validator.is_valid_configuration(&json!({
            "invokables": { "clock": "Clock" },
            "aliases": { "time": "clock", "now": "time" }
        })));
    }

    #[test]
    fn test_instances_need_no_catalog_entry() {
        let catalog = Catalog::empty();
        let config = ServiceConfig::new()
            .abstract_factory(AbstractFactoryRef::instance(Reflective))
            .initializer(InitializerRef::from_fn(|_: &Container, _: &Instance| Ok(())));

        ConfigValidator::new(&catalog).assert_is_valid(&config).unwrap();
    }
}
