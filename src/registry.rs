//! Configuration storage for the container
//!
//! Name-keyed entries live in `DashMap`s (with `ahash`) so lookups never take a
//! global lock; ordered lists and the alias graph sit behind `parking_lot`
//! locks. No lock is held while user code runs: callers clone the `Arc`s they
//! need out of the maps first.

use crate::alias::AliasGraph;
use crate::catalog::Catalog;
use crate::factory::{
    AbstractFactory, AbstractFactoryRef, Delegator, DelegatorRef, Factory, FactoryRef,
    Initializer, InitializerRef,
};
use crate::lazy::LazyServiceDelegator;
use crate::{DiError, Instance, LAZY_SERVICE_DELEGATOR, Result};
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::trace;

/// Shard count for the name-keyed maps.
///
/// Containers typically hold tens to a few hundred entries; the dashmap
/// default of `num_cpus * 4` shards only slows creation down.
const SHARDS: usize = 8;

fn name_map<V>() -> DashMap<String, V, RandomState> {
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), SHARDS)
}

/// Identity token of a shared trait object (its data pointer).
#[inline]
pub(crate) fn identity<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc).cast::<()>() as usize
}

// =============================================================================
// Entries
// =============================================================================

/// A factory registration; named references are instantiated once.
pub(crate) struct FactoryEntry {
    reference: FactoryRef,
    resolved: OnceCell<Arc<dyn Factory>>,
}

impl FactoryEntry {
    fn new(reference: FactoryRef) -> Self {
        let resolved = match &reference {
            FactoryRef::Instance(factory) => OnceCell::with_value(Arc::clone(factory)),
            FactoryRef::Named(_) => OnceCell::new(),
        };
        Self {
            reference,
            resolved,
        }
    }

    /// The callable factory, instantiating a catalog entry on first use.
    pub(crate) fn materialize(&self, catalog: &Catalog, service: &str) -> Result<Arc<dyn Factory>> {
        self.resolved
            .get_or_try_init(|| match &self.reference {
                FactoryRef::Named(name) => {
                    #[cfg(feature = "logging")]
                    trace!(
                        target: "service_locator",
                        service = service,
                        factory = name.as_str(),
                        "Instantiating factory from catalog"
                    );

                    catalog.instantiate_factory(name).ok_or_else(|| {
                        DiError::not_found_because(
                            service,
                            format!("factory \"{name}\" is not registered in the catalog"),
                        )
                    })
                }
                FactoryRef::Instance(factory) => Ok(Arc::clone(factory)),
            })
            .cloned()
    }

    #[cfg(test)]
    pub(crate) fn is_materialized(&self) -> bool {
        self.resolved.get().is_some()
    }
}

/// A delegator registration; named references are instantiated once.
pub(crate) struct DelegatorEntry {
    reference: DelegatorRef,
    resolved: OnceCell<Arc<dyn Delegator>>,
}

impl DelegatorEntry {
    fn new(reference: DelegatorRef) -> Self {
        Self {
            reference,
            resolved: OnceCell::new(),
        }
    }

    #[inline]
    pub(crate) fn reference(&self) -> &DelegatorRef {
        &self.reference
    }

    /// Whether this entry stands for the lazy-service delegator.
    #[inline]
    pub(crate) fn is_lazy(&self) -> bool {
        self.reference.name() == Some(LAZY_SERVICE_DELEGATOR)
    }

    /// The callable delegator, instantiating a catalog entry on first use.
    ///
    /// The lazy-service sentinel is never cached here; it is owned by the
    /// registry so that new lazy configuration takes effect.
    pub(crate) fn materialize(&self, catalog: &Catalog, service: &str) -> Result<Arc<dyn Delegator>> {
        self.resolved
            .get_or_try_init(|| match &self.reference {
                DelegatorRef::Named(name) => catalog.instantiate_delegator(name).ok_or_else(|| {
                    DiError::not_created(
                        service,
                        format!("delegator \"{name}\" is not registered in the catalog"),
                    )
                }),
                DelegatorRef::Instance(delegator) | DelegatorRef::Callback(delegator) => {
                    Ok(Arc::clone(delegator))
                }
            })
            .cloned()
    }
}

/// Ordered abstract factories, deduplicated by identity.
#[derive(Default)]
struct AbstractFactories {
    entries: Vec<(usize, Arc<dyn AbstractFactory>)>,
    by_name: HashMap<String, Arc<dyn AbstractFactory>, RandomState>,
}

impl AbstractFactories {
    fn resolve(&mut self, catalog: &Catalog, reference: AbstractFactoryRef) -> Result<Arc<dyn AbstractFactory>> {
        match reference {
            AbstractFactoryRef::Instance(factory) => Ok(factory),
            AbstractFactoryRef::Named(name) => {
                if let Some(cached) = self.by_name.get(&name) {
                    return Ok(Arc::clone(cached));
                }
                let factory = catalog.instantiate_abstract_factory(&name).ok_or_else(|| {
                    DiError::invalid_configuration(
                        "abstract_factories",
                        format!("\"{name}\" is not a known abstract factory"),
                    )
                })?;
                self.by_name.insert(name, Arc::clone(&factory));
                Ok(factory)
            }
        }
    }

    /// Append `factory` unless the same instance is already registered.
    fn push(&mut self, factory: Arc<dyn AbstractFactory>) -> bool {
        let id = identity(&factory);
        if self.entries.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        self.entries.push((id, factory));
        true
    }
}

#[derive(Default)]
struct LazyServices {
    class_map: Option<HashMap<String, String, RandomState>>,
    delegator: Option<Arc<LazyServiceDelegator>>,
}

// =============================================================================
// Registry
// =============================================================================

/// Everything a container knows about how to produce services.
pub(crate) struct Registry {
    /// Pre-built and cached shared instances
    services: DashMap<String, Instance, RandomState>,
    factories: DashMap<String, Arc<FactoryEntry>, RandomState>,
    delegators: DashMap<String, Vec<Arc<DelegatorEntry>>, RandomState>,
    shared: DashMap<String, bool, RandomState>,
    aliases: RwLock<AliasGraph>,
    abstract_factories: RwLock<AbstractFactories>,
    initializers: RwLock<Vec<Arc<dyn Initializer>>>,
    lazy_services: Mutex<LazyServices>,
    shared_by_default: AtomicBool,
    allow_override: AtomicBool,
    configured: AtomicBool,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            services: name_map(),
            factories: name_map(),
            delegators: name_map(),
            shared: name_map(),
            aliases: RwLock::new(AliasGraph::new()),
            abstract_factories: RwLock::new(AbstractFactories::default()),
            initializers: RwLock::new(Vec::new()),
            lazy_services: Mutex::new(LazyServices::default()),
            shared_by_default: AtomicBool::new(true),
            allow_override: AtomicBool::new(false),
            configured: AtomicBool::new(false),
        }
    }

    // -------------------------------------------------------------------------
    // Services
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn service(&self, name: &str) -> Option<Instance> {
        self.services.get(name).map(|s| Arc::clone(s.value()))
    }

    #[inline]
    pub(crate) fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    #[inline]
    pub(crate) fn insert_service(&self, name: &str, instance: Instance) {
        self.services.insert(name.to_owned(), instance);
    }

    pub(crate) fn service_count(&self) -> usize {
        self.services.len()
    }

    // -------------------------------------------------------------------------
    // Factories
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn factory(&self, name: &str) -> Option<Arc<FactoryEntry>> {
        self.factories.get(name).map(|f| Arc::clone(f.value()))
    }

    #[inline]
    pub(crate) fn has_factory(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub(crate) fn set_factory(&self, name: &str, reference: FactoryRef) {
        self.factories
            .insert(name.to_owned(), Arc::new(FactoryEntry::new(reference)));
    }

    pub(crate) fn factory_count(&self) -> usize {
        self.factories.len()
    }

    // -------------------------------------------------------------------------
    // Delegators
    // -------------------------------------------------------------------------

    /// Snapshot of the delegators registered for `name`, in registration order.
    pub(crate) fn delegators(&self, name: &str) -> Vec<Arc<DelegatorEntry>> {
        self.delegators
            .get(name)
            .map(|d| d.value().clone())
            .unwrap_or_default()
    }

    #[inline]
    pub(crate) fn has_delegators(&self, name: &str) -> bool {
        self.delegators.get(name).is_some_and(|d| !d.is_empty())
    }

    /// Append delegators for `name`.
    ///
    /// A name seen for the first time takes the list as given. Otherwise each
    /// reference is appended unless an equal one is already present.
    pub(crate) fn merge_delegators(&self, name: &str, references: Vec<DelegatorRef>) {
        let mut list = self.delegators.entry(name.to_owned()).or_default();
        if list.is_empty() {
            list.extend(references.into_iter().map(|r| Arc::new(DelegatorEntry::new(r))));
            return;
        }
        for reference in references {
            if !list.iter().any(|e| e.reference().is_same(&reference)) {
                list.push(Arc::new(DelegatorEntry::new(reference)));
            }
        }
    }

    /// Append a single delegator for `name`, even if an equal one exists.
    pub(crate) fn push_delegator(&self, name: &str, reference: DelegatorRef) {
        self.delegators
            .entry(name.to_owned())
            .or_default()
            .push(Arc::new(DelegatorEntry::new(reference)));
    }

    // -------------------------------------------------------------------------
    // Sharing
    // -------------------------------------------------------------------------

    /// Whether instances requested as `name` (resolving to `resolved`) are cached.
    ///
    /// A flag on the resolved name wins, then a flag on the requested name,
    /// then the container default.
    pub(crate) fn is_shared(&self, name: &str, resolved: &str) -> bool {
        if resolved != name {
            if let Some(flag) = self.shared.get(resolved) {
                return *flag;
            }
        }
        self.shared
            .get(name)
            .map(|flag| *flag)
            .unwrap_or_else(|| self.shared_by_default())
    }

    #[inline]
    pub(crate) fn set_shared(&self, name: &str, flag: bool) {
        self.shared.insert(name.to_owned(), flag);
    }

    #[inline]
    pub(crate) fn shared_by_default(&self) -> bool {
        self.shared_by_default.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_shared_by_default(&self, flag: bool) {
        self.shared_by_default.store(flag, Ordering::Release);
    }

    // -------------------------------------------------------------------------
    // Aliases
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn has_aliases(&self) -> bool {
        !self.aliases.read().is_empty()
    }

    /// Resolve `name` through the alias graph.
    pub(crate) fn resolve_alias(&self, name: &str) -> Result<String> {
        let aliases = self.aliases.read();
        aliases.resolve(name).map(str::to_owned)
    }

    #[inline]
    pub(crate) fn alias_target(&self, name: &str) -> Option<String> {
        self.aliases.read().target(name).map(str::to_owned)
    }

    pub(crate) fn add_alias(&self, alias: &str, target: &str) -> Result<()> {
        self.aliases.write().add(alias, target)
    }

    /// Validate `incoming` against the current aliases without applying it.
    pub(crate) fn prepare_aliases<'s, I>(&self, incoming: I) -> Result<AliasGraph>
    where
        I: IntoIterator<Item = (&'s str, &'s str)>,
    {
        let mut proposed = self.aliases.read().clone();
        proposed.extend(incoming)?;
        Ok(proposed)
    }

    pub(crate) fn replace_aliases(&self, graph: AliasGraph) {
        *self.aliases.write() = graph;
    }

    pub(crate) fn alias_count(&self) -> usize {
        self.aliases.read().len()
    }

    // -------------------------------------------------------------------------
    // Abstract factories
    // -------------------------------------------------------------------------

    /// Instantiate (if named) and register an abstract factory.
    pub(crate) fn add_abstract_factory(&self, catalog: &Catalog, reference: AbstractFactoryRef) -> Result<()> {
        let mut factories = self.abstract_factories.write();
        let factory = factories.resolve(catalog, reference)?;
        let _added = factories.push(factory);

        #[cfg(feature = "logging")]
        trace!(
            target: "service_locator",
            added = _added,
            abstract_factory_count = factories.entries.len(),
            "Abstract factory registered"
        );

        Ok(())
    }

    /// Snapshot of the abstract factories, in registration order.
    pub(crate) fn abstract_factories(&self) -> Vec<Arc<dyn AbstractFactory>> {
        self.abstract_factories
            .read()
            .entries
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Initializers
    // -------------------------------------------------------------------------

    pub(crate) fn add_initializer(&self, catalog: &Catalog, reference: InitializerRef) -> Result<()> {
        let initializer = match reference {
            InitializerRef::Instance(initializer) => initializer,
            InitializerRef::Named(name) => catalog.instantiate_initializer(&name).ok_or_else(|| {
                DiError::invalid_configuration(
                    "initializers",
                    format!("\"{name}\" is not a known initializer"),
                )
            })?,
        };
        self.initializers.write().push(initializer);
        Ok(())
    }

    /// Snapshot of the initializers, in registration order.
    pub(crate) fn initializers(&self) -> Vec<Arc<dyn Initializer>> {
        self.initializers.read().clone()
    }

    // -------------------------------------------------------------------------
    // Lazy services
    // -------------------------------------------------------------------------

    /// Merge lazy-service class map entries and drop the cached delegator.
    pub(crate) fn merge_lazy_class_map<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut lazy = self.lazy_services.lock();
        lazy.class_map.get_or_insert_with(HashMap::default).extend(entries);
        lazy.delegator = None;
    }

    /// The lazy-service delegator for the current class map.
    pub(crate) fn lazy_delegator(&self, service: &str) -> Result<Arc<LazyServiceDelegator>> {
        let mut lazy = self.lazy_services.lock();
        if let Some(delegator) = &lazy.delegator {
            return Ok(Arc::clone(delegator));
        }
        let Some(class_map) = &lazy.class_map else {
            return Err(DiError::not_created(
                service,
                "missing \"class_map\" in the \"lazy_services\" configuration",
            ));
        };
        let delegator = Arc::new(LazyServiceDelegator::new(class_map.clone()));
        lazy.delegator = Some(Arc::clone(&delegator));
        Ok(delegator)
    }

    // -------------------------------------------------------------------------
    // Flags
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn allow_override(&self) -> bool {
        self.allow_override.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_allow_override(&self, flag: bool) {
        self.allow_override.store(flag, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn mark_configured(&self) {
        self.configured.store(true, Ordering::Release);
    }

    /// Reject a mutation of `name` if it is a live service and overrides are off.
    #[inline]
    pub(crate) fn guard(&self, name: &str) -> Result<()> {
        if self.has_service(name) && !self.allow_override() {
            return Err(DiError::modification_not_allowed(name));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("services", &self.service_count())
            .field("factories", &self.factory_count())
            .field("aliases", &self.alias_count())
            .field("delegators", &self.delegators.len())
            .field("abstract_factories", &self.abstract_factories.read().entries.len())
            .field("initializers", &self.initializers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Container, Options, instance};
    use std::sync::atomic::AtomicUsize;

    fn echo(_: &Container, name: &str, _: Option<&Options>) -> Result<Instance> {
        Ok(instance(name.to_owned()))
    }

    struct Never;

    impl AbstractFactory for Never {
        fn can_create(&self, _: &Container, _: &str) -> bool {
            false
        }

        fn create(&self, _: &Container, name: &str, _: Option<&Options>) -> Result<Instance> {
            Err(DiError::not_found(name))
        }
    }

    #[test]
    fn test_named_factory_materialized_once() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let catalog = Catalog::new().with_factory("Echo", || {
            BUILT.fetch_add(1, Ordering::SeqCst);
            echo
        });
        let registry = Registry::new();
        registry.set_factory("Svc", FactoryRef::named("Echo"));

        let entry = registry.factory("Svc").unwrap();
        assert!(!entry.is_materialized());

        let a = entry.materialize(&catalog, "Svc").unwrap();
        let b = registry.factory("Svc").unwrap().materialize(&catalog, "Svc").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_named_factory_is_not_found() {
        let registry = Registry::new();
        registry.set_factory("Svc", FactoryRef::named("Ghost"));

        let err = registry
            .factory("Svc")
            .unwrap()
            .materialize(&Catalog::new(), "Svc")
            .err()
            .unwrap();
        assert!(matches!(err, DiError::NotFound { ref name, .. } if name == "Svc"));
    }

    #[test]
    fn test_merge_delegators_dedups_named() {
        let registry = Registry::new();
        registry.merge_delegators("Svc", vec![DelegatorRef::named("A"), DelegatorRef::named("B")]);
        registry.merge_delegators("Svc", vec![DelegatorRef::named("B"), DelegatorRef::named("C")]);

        let names: Vec<_> = registry
            .delegators("Svc")
            .iter()
            .map(|e| e.reference().name().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn test_merge_delegators_keeps_every_callback() {
        let registry = Registry::new();
        let cb = DelegatorRef::from_fn(|_: &Container, _: &str, next: crate::Callback, _: Option<&Options>| next());
        registry.merge_delegators("Svc", vec![cb.clone()]);
        registry.merge_delegators("Svc", vec![cb]);

        assert_eq!(registry.delegators("Svc").len(), 2);
    }

    #[test]
    fn test_abstract_factory_identity() {
        let registry = Registry::new();
        let catalog = Catalog::new();
        let shared: Arc<dyn AbstractFactory> = Arc::new(Never);

        registry
            .add_abstract_factory(&catalog, AbstractFactoryRef::Instance(Arc::clone(&shared)))
            .unwrap();
        registry
            .add_abstract_factory(&catalog, AbstractFactoryRef::Instance(shared))
            .unwrap();
        registry
            .add_abstract_factory(&catalog, AbstractFactoryRef::instance(Never))
            .unwrap();

        assert_eq!(registry.abstract_factories().len(), 2);
    }

    #[test]
    fn test_named_abstract_factory_instantiated_once() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let catalog = Catalog::new().with_abstract_factory("Never", || {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Never
        });
        let registry = Registry::new();
        registry
            .add_abstract_factory(&catalog, AbstractFactoryRef::named("Never"))
            .unwrap();
        registry
            .add_abstract_factory(&catalog, AbstractFactoryRef::named("Never"))
            .unwrap();

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert_eq!(registry.abstract_factories().len(), 1);
    }

    #[test]
    fn test_shared_flag_precedence() {
        let registry = Registry::new();
        assert!(registry.is_shared("a", "a"));

        registry.set_shared_by_default(false);
        assert!(!registry.is_shared("a", "a"));

        registry.set_shared("alias", true);
        assert!(registry.is_shared("alias", "Target"));

        registry.set_shared("Target", false);
        assert!(!registry.is_shared("alias", "Target"));
    }

    #[test]
    fn test_guard() {
        let registry = Registry::new();
        assert!(registry.guard("Db").is_ok());

        registry.insert_service("Db", instance(1_u8));
        assert!(matches!(
            registry.guard("Db"),
            Err(DiError::ModificationNotAllowed { .. })
        ));

        registry.set_allow_override(true);
        assert!(registry.guard("Db").is_ok());
    }

    #[test]
    fn test_lazy_delegator_reset_on_merge() {
        let registry = Registry::new();
        assert!(matches!(
            registry.lazy_delegator("Svc"),
            Err(DiError::NotCreated { .. })
        ));

        registry.merge_lazy_class_map([("Svc".to_string(), "Heavy".to_string())]);
        let first = registry.lazy_delegator("Svc").unwrap();
        assert!(Arc::ptr_eq(&first, &registry.lazy_delegator("Svc").unwrap()));

        registry.merge_lazy_class_map([("Other".to_string(), "Heavy".to_string())]);
        let second = registry.lazy_delegator("Svc").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
