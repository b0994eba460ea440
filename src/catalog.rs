//! Named component catalog
//!
//! Configuration refers to factories, abstract factories, delegators,
//! initializers and invokable types by name. The catalog maps those names to
//! constructors; the container instantiates them when a configuration entry
//! is first used.

use crate::factory::{AbstractFactory, Delegator, Factory, Initializer, InvokableFactory};
use crate::{DiError, INVOKABLE_FACTORY, Instance, Invokable, Options, Result};
use ahash::RandomState;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type FactoryCtor = Arc<dyn Fn() -> Arc<dyn Factory> + Send + Sync>;
type AbstractFactoryCtor = Arc<dyn Fn() -> Arc<dyn AbstractFactory> + Send + Sync>;
type DelegatorCtor = Arc<dyn Fn() -> Arc<dyn Delegator> + Send + Sync>;
type InitializerCtor = Arc<dyn Fn() -> Arc<dyn Initializer> + Send + Sync>;
type InvokeFn = Arc<dyn Fn(Option<&Options>) -> Result<Instance> + Send + Sync>;

/// Kinds of component a catalog name can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Factory,
    AbstractFactory,
    Delegator,
    Initializer,
    Invokable,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Factory => "factory",
            Self::AbstractFactory => "abstract factory",
            Self::Delegator => "delegator",
            Self::Initializer => "initializer",
            Self::Invokable => "invokable",
        })
    }
}

/// Immutable table of named constructors.
///
/// # Examples
///
/// ```rust
/// use service_locator::{Catalog, ComponentKind, Invokable, Options, Result};
///
/// struct Clock;
///
/// impl Invokable for Clock {
///     fn invoke(_: Option<&Options>) -> Result<Self> {
///         Ok(Clock)
///     }
/// }
///
/// let catalog = Catalog::new().with_invokable::<Clock>("Clock");
/// assert!(catalog.contains(ComponentKind::Invokable, "Clock"));
/// assert!(catalog.contains(ComponentKind::Factory, "InvokableFactory"));
/// ```
#[derive(Clone)]
pub struct Catalog {
    factories: HashMap<String, FactoryCtor, RandomState>,
    abstract_factories: HashMap<String, AbstractFactoryCtor, RandomState>,
    delegators: HashMap<String, DelegatorCtor, RandomState>,
    initializers: HashMap<String, InitializerCtor, RandomState>,
    invokables: HashMap<String, InvokeFn, RandomState>,
}

impl Catalog {
    /// Create a catalog holding only the built-in `InvokableFactory`.
    pub fn new() -> Self {
        Self::empty().with_factory(INVOKABLE_FACTORY, || InvokableFactory)
    }

    /// Create a catalog with no entries at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::default(),
            abstract_factories: HashMap::default(),
            delegators: HashMap::default(),
            initializers: HashMap::default(),
            invokables: HashMap::default(),
        }
    }

    /// Register a factory constructor under `name`.
    pub fn with_factory<F, C>(mut self, name: impl Into<String>, ctor: C) -> Self
    where
        F: Factory + 'static,
        C: Fn() -> F + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into(), Arc::new(move || Arc::new(ctor()) as Arc<dyn Factory>));
        self
    }

    /// Register an abstract factory constructor under `name`.
    pub fn with_abstract_factory<F, C>(mut self, name: impl Into<String>, ctor: C) -> Self
    where
        F: AbstractFactory + 'static,
        C: Fn() -> F + Send + Sync + 'static,
    {
        self.abstract_factories.insert(
            name.into(),
            Arc::new(move || Arc::new(ctor()) as Arc<dyn AbstractFactory>),
        );
        self
    }

    /// Register a delegator constructor under `name`.
    pub fn with_delegator<D, C>(mut self, name: impl Into<String>, ctor: C) -> Self
    where
        D: Delegator + 'static,
        C: Fn() -> D + Send + Sync + 'static,
    {
        self.delegators
            .insert(name.into(), Arc::new(move || Arc::new(ctor()) as Arc<dyn Delegator>));
        self
    }

    /// Register an initializer constructor under `name`.
    pub fn with_initializer<I, C>(mut self, name: impl Into<String>, ctor: C) -> Self
    where
        I: Initializer + 'static,
        C: Fn() -> I + Send + Sync + 'static,
    {
        self.initializers
            .insert(name.into(), Arc::new(move || Arc::new(ctor()) as Arc<dyn Initializer>));
        self
    }

    /// Register an invokable type under `name`.
    pub fn with_invokable<T: Invokable>(mut self, name: impl Into<String>) -> Self {
        self.invokables.insert(
            name.into(),
            Arc::new(|options: Option<&Options>| T::invoke(options).map(crate::instance)),
        );
        self
    }

    /// Whether `name` is registered as a component of the given kind.
    pub fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        match kind {
            ComponentKind::Factory => self.factories.contains_key(name),
            ComponentKind::AbstractFactory => self.abstract_factories.contains_key(name),
            ComponentKind::Delegator => self.delegators.contains_key(name),
            ComponentKind::Initializer => self.initializers.contains_key(name),
            ComponentKind::Invokable => self.invokables.contains_key(name),
        }
    }

    /// Fail with `InvalidConfiguration` at `key` unless `name` is a component of `kind`.
    pub(crate) fn require(&self, kind: ComponentKind, name: &str, key: &str) -> Result<()> {
        if self.contains(kind, name) {
            Ok(())
        } else {
            Err(DiError::invalid_configuration(
                key,
                format!("\"{name}\" is not a known {kind}"),
            ))
        }
    }

    pub(crate) fn instantiate_factory(&self, name: &str) -> Option<Arc<dyn Factory>> {
        self.factories.get(name).map(|ctor| ctor())
    }

    pub(crate) fn instantiate_abstract_factory(&self, name: &str) -> Option<Arc<dyn AbstractFactory>> {
        self.abstract_factories.get(name).map(|ctor| ctor())
    }

    pub(crate) fn instantiate_delegator(&self, name: &str) -> Option<Arc<dyn Delegator>> {
        self.delegators.get(name).map(|ctor| ctor())
    }

    pub(crate) fn instantiate_initializer(&self, name: &str) -> Option<Arc<dyn Initializer>> {
        self.initializers.get(name).map(|ctor| ctor())
    }

    /// Construct the invokable registered under `name`.
    pub fn invoke(&self, name: &str, options: Option<&Options>) -> Result<Instance> {
        match self.invokables.get(name) {
            Some(invoke) => invoke(options),
            None => Err(DiError::not_created(
                name,
                "no invokable type is registered in the catalog under this name",
            )),
        }
    }

    /// Number of registered components of every kind.
    pub fn len(&self) -> usize {
        self.factories.len()
            + self.abstract_factories.len()
            + self.delegators.len()
            + self.initializers.len()
            + self.invokables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("factories", &self.factories.len())
            .field("abstract_factories", &self.abstract_factories.len())
            .field("delegators", &self.delegators.len())
            .field("initializers", &self.initializers.len())
            .field("invokables", &self.invokables.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Container;

    struct Widget {
        size: u64,
    }

    impl Invokable for Widget {
        fn invoke(options: Option<&Options>) -> Result<Self> {
            let size = options
                .and_then(|o| o.get("size"))
                .and_then(|v| v.as_u64())
                .unwrap_or(1);
            Ok(Widget { size })
        }
    }

    #[test]
    fn test_builtin_invokable_factory() {
        let catalog = Catalog::new();
        assert!(catalog.contains(ComponentKind::Factory, INVOKABLE_FACTORY));
        assert!(!Catalog::empty().contains(ComponentKind::Factory, INVOKABLE_FACTORY));
    }

    #[test]
    fn test_invoke_with_options() {
        let catalog = Catalog::new().with_invokable::<Widget>("Widget");

        let mut options = Options::new();
        options.insert("size".into(), 7.into());

        let widget = catalog.invoke("Widget", Some(&options)).unwrap();
        assert_eq!(widget.downcast_ref::<Widget>().unwrap().size, 7);

        let default = catalog.invoke("Widget", None).unwrap();
        assert_eq!(default.downcast_ref::<Widget>().unwrap().size, 1);
    }

    #[test]
    fn test_invoke_unknown_name() {
        let err = Catalog::new().invoke("Nope", None).unwrap_err();
        assert!(matches!(err, DiError::NotCreated { ref name, .. } if name == "Nope"));
    }

    #[test]
    fn test_instantiation_is_fresh_each_time() {
        let catalog = Catalog::new().with_factory("Echo", || {
            |_: &Container, name: &str, _: Option<&Options>| -> Result<Instance> {
                Ok(crate::instance(name.to_owned()))
            }
        });

        let a = catalog.instantiate_factory("Echo").unwrap();
        let b = catalog.instantiate_factory("Echo").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(catalog.instantiate_factory("Missing").is_none());
    }

    #[test]
    fn test_require_names_the_key() {
        let err = Catalog::new()
            .require(ComponentKind::Delegator, "Audit", "delegators.Repo")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration at \"delegators.Repo\": \"Audit\" is not a known delegator"
        );
    }
}
