//! Construction capabilities consumed by the container
//!
//! Services are built by [`Factory`] implementations, located by name or by
//! an [`AbstractFactory`] predicate, decorated by [`Delegator`]s and
//! post-processed by [`Initializer`]s. Each capability can be referenced
//! either by catalog name or by instance; the `*Ref` enums carry that choice
//! into the registry, where it is resolved once on first use.

use crate::{Container, Instance, Options, Result};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Catalog name of the built-in [`InvokableFactory`].
pub const INVOKABLE_FACTORY: &str = "InvokableFactory";

/// Deferred creation handed to delegators; yields the undecorated instance.
pub type Callback = Box<dyn FnOnce() -> Result<Instance> + Send>;

// =============================================================================
// Capability traits
// =============================================================================

/// Builds the service registered under a name.
pub trait Factory: Send + Sync {
    /// Create an instance for `requested_name`.
    fn create(
        &self,
        container: &Container,
        requested_name: &str,
        options: Option<&Options>,
    ) -> Result<Instance>;
}

impl<F> Factory for F
where
    F: Fn(&Container, &str, Option<&Options>) -> Result<Instance> + Send + Sync,
{
    #[inline]
    fn create(
        &self,
        container: &Container,
        requested_name: &str,
        options: Option<&Options>,
    ) -> Result<Instance> {
        self(container, requested_name, options)
    }
}

/// A fallback factory consulted for names without a direct factory.
pub trait AbstractFactory: Send + Sync {
    /// Whether this factory is able to build `requested_name`.
    fn can_create(&self, container: &Container, requested_name: &str) -> bool;

    /// Create an instance for `requested_name`.
    fn create(
        &self,
        container: &Container,
        requested_name: &str,
        options: Option<&Options>,
    ) -> Result<Instance>;
}

/// Decorates or replaces the instance produced by the rest of the chain.
pub trait Delegator: Send + Sync {
    /// Produce the final instance, usually by calling `callback` and wrapping it.
    fn delegate(
        &self,
        container: &Container,
        name: &str,
        callback: Callback,
        options: Option<&Options>,
    ) -> Result<Instance>;
}

impl<F> Delegator for F
where
    F: Fn(&Container, &str, Callback, Option<&Options>) -> Result<Instance> + Send + Sync,
{
    #[inline]
    fn delegate(
        &self,
        container: &Container,
        name: &str,
        callback: Callback,
        options: Option<&Options>,
    ) -> Result<Instance> {
        self(container, name, callback, options)
    }
}

/// Post-construction hook run against every freshly created instance.
pub trait Initializer: Send + Sync {
    fn initialize(&self, container: &Container, instance: &Instance) -> Result<()>;
}

impl<F> Initializer for F
where
    F: Fn(&Container, &Instance) -> Result<()> + Send + Sync,
{
    #[inline]
    fn initialize(&self, container: &Container, instance: &Instance) -> Result<()> {
        self(container, instance)
    }
}

// =============================================================================
// Built-in factories
// =============================================================================

/// Builds the requested name as an invokable type from the container's catalog.
///
/// Registering `factories: {"Mailer": "InvokableFactory"}` makes `Mailer`
/// buildable as long as the catalog knows an invokable called `Mailer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvokableFactory;

impl Factory for InvokableFactory {
    fn create(
        &self,
        container: &Container,
        requested_name: &str,
        options: Option<&Options>,
    ) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: "service_locator",
            service = requested_name,
            with_options = options.is_some(),
            "Invoking catalog constructor"
        );

        container.catalog().invoke(requested_name, options)
    }
}

/// An abstract factory assembled from a predicate and a constructor closure.
///
/// # Examples
///
/// ```rust
/// use service_locator::{AbstractFactoryRef, Container, FnAbstractFactory, Options, instance};
///
/// let prefixed = FnAbstractFactory::new(
///     |_: &Container, name: &str| name.starts_with("cache."),
///     |_: &Container, name: &str, _: Option<&Options>| Ok(instance(name.to_owned())),
/// );
///
/// let container = Container::new();
/// container
///     .add_abstract_factory(AbstractFactoryRef::instance(prefixed))
///     .unwrap();
/// assert!(container.has("cache.users"));
/// ```
pub struct FnAbstractFactory<P, C> {
    predicate: P,
    constructor: C,
}

impl<P, C> FnAbstractFactory<P, C>
where
    P: Fn(&Container, &str) -> bool + Send + Sync + 'static,
    C: Fn(&Container, &str, Option<&Options>) -> Result<Instance> + Send + Sync + 'static,
{
    pub fn new(predicate: P, constructor: C) -> Self {
        Self {
            predicate,
            constructor,
        }
    }
}

impl<P, C> AbstractFactory for FnAbstractFactory<P, C>
where
    P: Fn(&Container, &str) -> bool + Send + Sync,
    C: Fn(&Container, &str, Option<&Options>) -> Result<Instance> + Send + Sync,
{
    #[inline]
    fn can_create(&self, container: &Container, requested_name: &str) -> bool {
        (self.predicate)(container, requested_name)
    }

    #[inline]
    fn create(
        &self,
        container: &Container,
        requested_name: &str,
        options: Option<&Options>,
    ) -> Result<Instance> {
        (self.constructor)(container, requested_name, options)
    }
}

// =============================================================================
// References - resolved once, then cached by the registry
// =============================================================================

/// How a factory is referenced in configuration.
#[derive(Clone)]
pub enum FactoryRef {
    /// A catalog name, instantiated on first use
    Named(String),
    /// A ready factory (struct or closure)
    Instance(Arc<dyn Factory>),
}

impl FactoryRef {
    /// Reference a catalog factory by name
    #[inline]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Reference the built-in [`InvokableFactory`]
    #[inline]
    pub fn invokable() -> Self {
        Self::Named(INVOKABLE_FACTORY.to_owned())
    }

    /// Use a factory instance
    #[inline]
    pub fn instance<F: Factory + 'static>(factory: F) -> Self {
        Self::Instance(Arc::new(factory))
    }

    /// Use a closure as the factory
    #[inline]
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn(&Container, &str, Option<&Options>) -> Result<Instance> + Send + Sync + 'static,
    {
        Self::Instance(Arc::new(factory))
    }

    /// The catalog name, if this is a named reference
    #[inline]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Instance(_) => None,
        }
    }
}

impl From<&str> for FactoryRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for FactoryRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Factory>> for FactoryRef {
    fn from(factory: Arc<dyn Factory>) -> Self {
        Self::Instance(factory)
    }
}

impl fmt::Debug for FactoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// How an abstract factory is referenced in configuration.
#[derive(Clone)]
pub enum AbstractFactoryRef {
    /// A catalog name; instantiated once per name and reused
    Named(String),
    /// A ready abstract factory, deduplicated by identity
    Instance(Arc<dyn AbstractFactory>),
}

impl AbstractFactoryRef {
    #[inline]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    #[inline]
    pub fn instance<F: AbstractFactory + 'static>(factory: F) -> Self {
        Self::Instance(Arc::new(factory))
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Instance(_) => None,
        }
    }
}

impl From<&str> for AbstractFactoryRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for AbstractFactoryRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn AbstractFactory>> for AbstractFactoryRef {
    fn from(factory: Arc<dyn AbstractFactory>) -> Self {
        Self::Instance(factory)
    }
}

impl fmt::Debug for AbstractFactoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// How a delegator is referenced in configuration.
///
/// Named and instance references compare equal to themselves, so merging the
/// same configuration twice does not stack them. Closures are never
/// considered equal to anything.
#[derive(Clone)]
pub enum DelegatorRef {
    /// A catalog name (or the lazy-service sentinel), instantiated on first use
    Named(String),
    /// A shared delegator instance, compared by identity
    Instance(Arc<dyn Delegator>),
    /// An anonymous closure
    Callback(Arc<dyn Delegator>),
}

impl DelegatorRef {
    #[inline]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Reference the lazy-service delegator
    #[inline]
    pub fn lazy() -> Self {
        Self::Named(crate::LAZY_SERVICE_DELEGATOR.to_owned())
    }

    #[inline]
    pub fn instance(delegator: Arc<dyn Delegator>) -> Self {
        Self::Instance(delegator)
    }

    #[inline]
    pub fn from_fn<F>(delegator: F) -> Self
    where
        F: Fn(&Container, &str, Callback, Option<&Options>) -> Result<Instance>
            + Send
            + Sync
            + 'static,
    {
        Self::Callback(Arc::new(delegator))
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Whether two references denote the same delegator for merge purposes
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Named(a), Self::Named(b)) => a == b,
            (Self::Instance(a), Self::Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for DelegatorRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for DelegatorRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Delegator>> for DelegatorRef {
    fn from(delegator: Arc<dyn Delegator>) -> Self {
        Self::Instance(delegator)
    }
}

impl fmt::Debug for DelegatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// How an initializer is referenced in configuration.
#[derive(Clone)]
pub enum InitializerRef {
    Named(String),
    Instance(Arc<dyn Initializer>),
}

impl InitializerRef {
    #[inline]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    #[inline]
    pub fn from_fn<F>(initializer: F) -> Self
    where
        F: Fn(&Container, &Instance) -> Result<()> + Send + Sync + 'static,
    {
        Self::Instance(Arc::new(initializer))
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Instance(_) => None,
        }
    }
}

impl From<&str> for InitializerRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for InitializerRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Initializer>> for InitializerRef {
    fn from(initializer: Arc<dyn Initializer>) -> Self {
        Self::Instance(initializer)
    }
}

impl fmt::Debug for InitializerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance;

    fn noop(_: &Container, _: &str, callback: Callback, _: Option<&Options>) -> Result<Instance> {
        callback()
    }

    #[test]
    fn test_named_delegators_compare_by_name() {
        assert!(DelegatorRef::named("Audit").is_same(&DelegatorRef::named("Audit")));
        assert!(!DelegatorRef::named("Audit").is_same(&DelegatorRef::named("Trace")));
    }

    #[test]
    fn test_instance_delegators_compare_by_identity() {
        let shared: Arc<dyn Delegator> = Arc::new(noop);
        let a = DelegatorRef::instance(Arc::clone(&shared));
        let b = DelegatorRef::instance(shared);
        let other = DelegatorRef::instance(Arc::new(noop));

        assert!(a.is_same(&b));
        assert!(!a.is_same(&other));
    }

    #[test]
    fn test_callbacks_never_compare_equal() {
        let cb = DelegatorRef::from_fn(noop);
        assert!(!cb.is_same(&cb.clone()));
    }

    #[test]
    fn test_closure_factory() {
        let factory = FactoryRef::from_fn(|_: &Container, name: &str, _: Option<&Options>| {
            Ok(instance(format!("built:{name}")))
        });
        let FactoryRef::Instance(factory) = factory else {
            panic!("closure should be an instance reference");
        };

        let container = Container::new();
        let built = factory.create(&container, "Svc", None).unwrap();
        assert_eq!(built.downcast_ref::<String>().unwrap(), "built:Svc");
    }

    #[test]
    fn test_string_conversions_are_named() {
        assert_eq!(FactoryRef::from("X").name(), Some("X"));
        assert_eq!(FactoryRef::invokable().name(), Some(INVOKABLE_FACTORY));
        assert_eq!(AbstractFactoryRef::from("Af").name(), Some("Af"));
        assert_eq!(InitializerRef::from("Init".to_string()).name(), Some("Init"));
    }
}
