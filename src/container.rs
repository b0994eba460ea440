//! String-keyed service container
//!
//! The `Container` maps service names to instances. It decides how a name is
//! built (factory, abstract factory, delegators), whether the result is
//! cached, and which initializers run on it.

use crate::catalog::{Catalog, ComponentKind};
use crate::config::ServiceConfig;
use crate::delegator::DelegatorChain;
use crate::factory::{AbstractFactoryRef, DelegatorRef, FactoryRef, InitializerRef};
use crate::lazy::LazyService;
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::validator::ConfigValidator;
use crate::{DiError, Injectable, Instance, LAZY_SERVICE_DELEGATOR, Options, Result};
use std::borrow::Cow;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Dependency injection container keyed by service name.
///
/// Cloning a container is cheap and yields a handle to the same registry.
///
/// # Examples
///
/// ```rust
/// use service_locator::{Container, FactoryRef, instance};
///
/// struct Database {
///     url: String,
/// }
///
/// let container = Container::new();
/// container
///     .set_factory(
///         "Database",
///         FactoryRef::from_fn(|_, _, _| {
///             Ok(instance(Database { url: "postgres://localhost".into() }))
///         }),
///     )
///     .unwrap();
/// container.set_alias("db", "Database").unwrap();
///
/// let a = container.get::<Database>("db").unwrap();
/// let b = container.get::<Database>("Database").unwrap();
/// assert_eq!(a.url, "postgres://localhost");
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
#[derive(Clone)]
pub struct Container {
    registry: Arc<Registry>,
    catalog: Arc<Catalog>,
    /// Handed to factories instead of `self` when set
    context: Option<Arc<Container>>,
}

impl Container {
    /// Create an empty container over the default catalog.
    #[inline]
    pub fn new() -> Self {
        Self::with_catalog(Catalog::new())
    }

    /// Create an empty container whose named references resolve in `catalog`.
    pub fn with_catalog(catalog: Catalog) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_locator",
            catalog_entries = catalog.len(),
            "Creating service container"
        );

        Self {
            registry: Arc::new(Registry::new()),
            catalog: Arc::new(catalog),
            context: None,
        }
    }

    /// Create a container from `catalog` and an initial configuration.
    pub fn from_config(catalog: Catalog, config: ServiceConfig) -> Result<Self> {
        let container = Self::with_catalog(catalog);
        container.configure(config)?;
        Ok(container)
    }

    /// Create an empty container that hands `parent` to its factories.
    ///
    /// The catalog is shared with `parent`.
    pub fn with_context(parent: &Container) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_locator",
            "Creating service container with a parent creation context"
        );

        Self {
            registry: Arc::new(Registry::new()),
            catalog: Arc::clone(&parent.catalog),
            context: Some(Arc::new(parent.clone())),
        }
    }

    /// The catalog named references are resolved in.
    #[inline]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The container passed to factories, delegators and initializers.
    #[inline]
    pub fn context(&self) -> &Container {
        self.context.as_deref().unwrap_or(self)
    }

    #[inline]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A handle that does not keep the registry or catalog alive.
    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            registry: Arc::downgrade(&self.registry),
            catalog: Arc::downgrade(&self.catalog),
            context: self.context.as_ref().map(Arc::downgrade),
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a service as a type-erased instance.
    ///
    /// Shared services are created once and cached under both the requested
    /// and the resolved name.
    pub fn get_any(&self, name: &str) -> Result<Instance> {
        let registry = self.registry();

        if let Some(service) = registry.service(name) {
            #[cfg(feature = "logging")]
            trace!(
                target: "service_locator",
                service = name,
                location = "cache",
                "Service resolved from cache"
            );
            return Ok(service);
        }

        let resolved: Cow<'_, str> = if registry.has_aliases() {
            Cow::Owned(registry.resolve_alias(name)?)
        } else {
            Cow::Borrowed(name)
        };
        let shared = registry.is_shared(name, &resolved);

        if resolved != name {
            if let Some(service) = registry
                .service(&resolved)
                .filter(|_| shared || !self.can_build(&resolved))
            {
                if shared {
                    registry.insert_service(name, Arc::clone(&service));
                }

                #[cfg(feature = "logging")]
                trace!(
                    target: "service_locator",
                    service = name,
                    resolved = resolved.as_ref(),
                    location = "cache",
                    "Service resolved from cache through alias"
                );
                return Ok(service);
            }
        }

        let instance = self.do_create(&resolved, None)?;

        if shared {
            registry.insert_service(&resolved, Arc::clone(&instance));
            if resolved != name {
                registry.insert_service(name, Arc::clone(&instance));
            }
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "service_locator",
            service = name,
            resolved = resolved.as_ref(),
            shared = shared,
            "Service created"
        );

        Ok(instance)
    }

    /// Resolve a service and downcast it to `T`.
    ///
    /// A [`LazyService`] proxy is initialized and unwrapped unless `T` is
    /// `LazyService` itself.
    ///
    /// # Errors
    ///
    /// Anything [`get_any`](Self::get_any) raises, or `InvalidService` when the
    /// instance is not a `T`.
    #[inline]
    pub fn get<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        downcast(name, self.get_any(name)?)
    }

    /// Resolve a service, returning `None` on any failure.
    #[inline]
    pub fn try_get<T: Injectable>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).ok()
    }

    /// Create a fresh instance, bypassing the shared cache.
    ///
    /// `options` is passed to the factory and every delegator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use service_locator::{Container, FactoryRef, Options, instance};
    ///
    /// let container = Container::new();
    /// container
    ///     .set_factory(
    ///         "Greeting",
    ///         FactoryRef::from_fn(|_, _, options: Option<&Options>| {
    ///             let who = options
    ///                 .and_then(|o| o.get("who"))
    ///                 .and_then(|v| v.as_str())
    ///                 .unwrap_or("world");
    ///             Ok(instance(format!("hello {who}")))
    ///         }),
    ///     )
    ///     .unwrap();
    ///
    /// let mut options = Options::new();
    /// options.insert("who".into(), "rust".into());
    ///
    /// let greeting = container.build::<String>("Greeting", Some(&options)).unwrap();
    /// assert_eq!(*greeting, "hello rust");
    /// ```
    pub fn build_any(&self, name: &str, options: Option<&Options>) -> Result<Instance> {
        let resolved = self.registry().resolve_alias(name)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "service_locator",
            service = name,
            resolved = resolved.as_str(),
            with_options = options.is_some(),
            "Building service"
        );

        self.do_create(&resolved, options)
    }

    /// Create a fresh instance and downcast it to `T`.
    #[inline]
    pub fn build<T: Injectable>(&self, name: &str, options: Option<&Options>) -> Result<Arc<T>> {
        downcast(name, self.build_any(name, options)?)
    }

    /// Whether `get(name)` can locate something to return.
    ///
    /// A cached service under `name` counts. Otherwise the alias target (or
    /// `name` itself) is checked for a service, delegators or a direct
    /// factory before the abstract factories are consulted.
    pub fn has(&self, name: &str) -> bool {
        let registry = self.registry();

        if registry.has_service(name) {
            return true;
        }

        let target = registry.alias_target(name);
        let resolved = target.as_deref().unwrap_or(name);
        registry.has_service(resolved)
            || registry.has_delegators(resolved)
            || self.can_build(resolved)
    }

    /// Whether a direct or abstract factory can create `resolved`.
    fn can_build(&self, resolved: &str) -> bool {
        let registry = self.registry();
        if registry.has_factory(resolved) {
            return true;
        }

        let context = self.context();
        registry
            .abstract_factories()
            .iter()
            .any(|f| f.can_create(context, resolved))
    }

    /// Build `resolved` through delegators or its factory, then run initializers.
    fn do_create(&self, resolved: &str, options: Option<&Options>) -> Result<Instance> {
        let registry = self.registry();
        let delegators = registry.delegators(resolved);

        let instance = if delegators.is_empty() {
            Resolver::new(self).create(resolved, options)
        } else {
            DelegatorChain::new(self, delegators).create(resolved, options)
        }
        .map_err(|e| e.while_creating(resolved))?;

        let context = self.context();
        for initializer in registry.initializers() {
            initializer
                .initialize(context, &instance)
                .map_err(|e| e.while_creating(resolved))?;
        }

        Ok(instance)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Merge a configuration batch.
    ///
    /// Catalog references are checked before anything is changed, as are the
    /// aliases (including those implied by invokables) for cycles. Once the
    /// container has been configured and overrides are disallowed, a batch
    /// touching an existing service is rejected.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_json::json;
    /// use service_locator::{Catalog, Container, Invokable, Options, Result, ServiceConfig};
    ///
    /// struct Clock;
    ///
    /// impl Invokable for Clock {
    ///     fn invoke(_: Option<&Options>) -> Result<Self> {
    ///         Ok(Clock)
    ///     }
    /// }
    ///
    /// let container = Container::with_catalog(Catalog::new().with_invokable::<Clock>("Clock"));
    /// container
    ///     .configure(ServiceConfig::from_json(&json!({
    ///         "factories": { "Clock": "InvokableFactory" },
    ///         "aliases": { "clock": "Clock" }
    ///     })).unwrap())
    ///     .unwrap();
    ///
    /// let a = container.get::<Clock>("clock").unwrap();
    /// let b = container.get::<Clock>("Clock").unwrap();
    /// assert!(std::sync::Arc::ptr_eq(&a, &b));
    /// ```
    pub fn configure(&self, config: ServiceConfig) -> Result<&Self> {
        let registry = self.registry();

        if registry.is_configured() && !registry.allow_override() {
            if let Some(name) = config.touched_names().find(|n| registry.has_service(n)) {
                return Err(DiError::modification_not_allowed(name));
            }
        }

        ConfigValidator::new(&self.catalog).assert_is_valid(&config)?;

        let invokable_aliases = config
            .invokables
            .iter()
            .filter(|(name, class)| name != class)
            .map(|(name, class)| (name.as_str(), class.as_str()));
        let explicit_aliases = config.aliases.iter().map(|(a, t)| (a.as_str(), t.as_str()));
        let aliases = if config.aliases.is_empty() && invokable_aliases.clone().next().is_none() {
            None
        } else {
            Some(registry.prepare_aliases(invokable_aliases.chain(explicit_aliases))?)
        };

        let ServiceConfig {
            services,
            factories,
            invokables,
            aliases: _,
            delegators,
            initializers,
            abstract_factories,
            shared,
            shared_by_default,
            lazy_class_map,
        } = config;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_locator",
            services = services.len(),
            factories = factories.len(),
            invokables = invokables.len(),
            delegators = delegators.len(),
            abstract_factories = abstract_factories.len(),
            initializers = initializers.len(),
            "Merging configuration"
        );

        for (name, service) in services {
            registry.insert_service(&name, service);
        }

        for class in invokables.into_values() {
            registry.set_factory(&class, FactoryRef::invokable());
        }

        for (name, factory) in factories {
            registry.set_factory(&name, factory);
        }

        for (name, list) in delegators {
            registry.merge_delegators(&name, list);
        }

        for (name, flag) in shared {
            registry.set_shared(&name, flag);
        }

        if let Some(aliases) = aliases {
            registry.replace_aliases(aliases);
        }

        if let Some(flag) = shared_by_default {
            registry.set_shared_by_default(flag);
        }

        if !lazy_class_map.is_empty() {
            registry.merge_lazy_class_map(lazy_class_map);
        }

        for factory in abstract_factories {
            registry.add_abstract_factory(&self.catalog, factory)?;
        }

        for initializer in initializers {
            registry.add_initializer(&self.catalog, initializer)?;
        }

        registry.mark_configured();
        Ok(self)
    }

    /// Parse a raw configuration map and merge it.
    pub fn configure_json(&self, raw: &serde_json::Value) -> Result<&Self> {
        self.configure(ServiceConfig::from_json(raw)?)
    }

    // =========================================================================
    // Single-item mutators
    // =========================================================================

    /// Make `alias` resolve to `target`.
    pub fn set_alias(&self, alias: &str, target: &str) -> Result<()> {
        self.registry().guard(alias)?;
        self.registry().add_alias(alias, target)
    }

    /// Make the catalog invokable `class` buildable, as `name` if given.
    ///
    /// With a `name` different from `class`, `name` becomes an alias.
    pub fn set_invokable(&self, class: &str, name: Option<&str>) -> Result<()> {
        let name = name.unwrap_or(class);
        let registry = self.registry();

        registry.guard(name)?;
        if name != class {
            registry.guard(class)?;
        }
        self.catalog
            .require(ComponentKind::Invokable, class, &format!("invokables.{name}"))?;

        if name != class {
            registry.add_alias(name, class)?;
        }
        registry.set_factory(class, FactoryRef::invokable());
        Ok(())
    }

    /// Register the factory for `name`.
    pub fn set_factory(&self, name: &str, factory: impl Into<FactoryRef>) -> Result<()> {
        let factory = factory.into();
        self.registry().guard(name)?;
        if let Some(factory) = factory.name() {
            self.catalog
                .require(ComponentKind::Factory, factory, &format!("factories.{name}"))?;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_locator",
            service = name,
            factory = ?factory,
            "Registering factory"
        );

        self.registry().set_factory(name, factory);
        Ok(())
    }

    /// Register a pre-built service.
    pub fn set_service<T: Injectable>(&self, name: &str, value: T) -> Result<()> {
        self.set_service_instance(name, crate::instance(value))
    }

    /// Register a pre-built, already type-erased service.
    pub fn set_service_instance(&self, name: &str, value: Instance) -> Result<()> {
        self.registry().guard(name)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_locator",
            service = name,
            "Registering service instance"
        );

        self.registry().insert_service(name, value);
        Ok(())
    }

    /// Set whether `name` is cached after creation.
    pub fn set_shared(&self, name: &str, flag: bool) -> Result<()> {
        self.registry().guard(name)?;
        self.registry().set_shared(name, flag);
        Ok(())
    }

    /// Append an abstract factory.
    ///
    /// A factory instance that is already registered is not added twice.
    pub fn add_abstract_factory(&self, factory: impl Into<AbstractFactoryRef>) -> Result<()> {
        self.registry()
            .add_abstract_factory(&self.catalog, factory.into())
    }

    /// Append a delegator for `name`.
    pub fn add_delegator(&self, name: &str, delegator: impl Into<DelegatorRef>) -> Result<()> {
        let delegator = delegator.into();
        self.registry().guard(name)?;
        match delegator.name() {
            Some(LAZY_SERVICE_DELEGATOR) | None => {}
            Some(named) => self.catalog.require(
                ComponentKind::Delegator,
                named,
                &format!("delegators.{name}"),
            )?,
        }
        self.registry().push_delegator(name, delegator);
        Ok(())
    }

    /// Append an initializer.
    pub fn add_initializer(&self, initializer: impl Into<InitializerRef>) -> Result<()> {
        self.registry()
            .add_initializer(&self.catalog, initializer.into())
    }

    /// Add `name` to the lazy-service class map, labelled `class` (or `name`).
    pub fn map_lazy_service(&self, name: &str, class: Option<&str>) -> Result<()> {
        self.registry().guard(name)?;
        self.registry()
            .merge_lazy_class_map([(name.to_owned(), class.unwrap_or(name).to_owned())]);
        Ok(())
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// Allow or forbid replacing existing services.
    #[inline]
    pub fn set_allow_override(&self, flag: bool) {
        self.registry().set_allow_override(flag);
    }

    #[inline]
    pub fn allow_override(&self) -> bool {
        self.registry().allow_override()
    }

    /// Set whether services without a sharing flag are cached.
    #[inline]
    pub fn set_shared_by_default(&self, flag: bool) {
        self.registry().set_shared_by_default(flag);
    }

    #[inline]
    pub fn shared_by_default(&self) -> bool {
        self.registry().shared_by_default()
    }
}

/// Non-owning handle to a [`Container`], held by creation callbacks.
///
/// A lazy proxy keeps its callback and may itself be cached in the registry.
#[derive(Clone)]
pub(crate) struct WeakContainer {
    registry: Weak<Registry>,
    catalog: Weak<Catalog>,
    context: Option<Weak<Container>>,
}

impl WeakContainer {
    /// The container, unless every handle to it has been dropped.
    pub(crate) fn upgrade(&self) -> Option<Container> {
        let context = match &self.context {
            Some(context) => Some(context.upgrade()?),
            None => None,
        };

        Some(Container {
            registry: self.registry.upgrade()?,
            catalog: self.catalog.upgrade()?,
            context,
        })
    }
}

/// Downcast `instance` to `T`, unwrapping a lazy proxy if necessary.
pub(crate) fn downcast<T: Injectable>(name: &str, instance: Instance) -> Result<Arc<T>> {
    match instance.downcast::<T>() {
        Ok(value) => Ok(value),
        Err(instance) => match instance.downcast::<LazyService>() {
            Ok(proxy) => proxy.get::<T>(),
            Err(_) => Err(DiError::invalid_service::<T>(name)),
        },
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registry", &self.registry)
            .field("catalog", &self.catalog)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}
