//! Plugin managers
//!
//! A [`PluginManager`] is a container restricted to a single plugin type. Its
//! factories receive the parent application container, and every instance it
//! hands out is checked against the plugin type.

use crate::catalog::ComponentKind;
use crate::config::ServiceConfig;
use crate::container::downcast;
use crate::factory::FactoryRef;
use crate::validator::ConfigValidator;
use crate::{Container, Injectable, Instance, Options, Result};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// A type-checked container for plugins of type `T`.
///
/// # Examples
///
/// ```rust
/// use service_locator::{Catalog, Container, Invokable, Options, PluginManager, Result, ServiceConfig};
///
/// struct Markdown;
///
/// impl Invokable for Markdown {
///     fn invoke(_: Option<&Options>) -> Result<Self> {
///         Ok(Markdown)
///     }
/// }
///
/// let app = Container::with_catalog(Catalog::new().with_invokable::<Markdown>("Markdown"));
/// let filters = PluginManager::<Markdown>::new(&app, ServiceConfig::new()).unwrap();
///
/// // Catalog invokables are registered on first request
/// assert!(filters.has("Markdown"));
/// let a = filters.get("Markdown").unwrap();
/// let b = filters.get("Markdown").unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
pub struct PluginManager<T> {
    container: Container,
    auto_invokables: bool,
    _plugin: PhantomData<fn() -> T>,
}

impl<T: Injectable> PluginManager<T> {
    /// Create a plugin manager whose factories receive `parent`.
    pub fn new(parent: &Container, config: ServiceConfig) -> Result<Self> {
        let container = Container::with_context(parent);
        container.configure(config)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_locator",
            plugin = T::type_name_of(),
            "Creating plugin manager"
        );

        Ok(Self {
            container,
            auto_invokables: true,
            _plugin: PhantomData,
        })
    }

    /// Validate and parse a raw configuration map, then create the manager.
    pub fn from_json(parent: &Container, raw: &serde_json::Value) -> Result<Self> {
        ConfigValidator::new(parent.catalog()).assert_is_valid_configuration(raw)?;
        Self::new(parent, ServiceConfig::from_json(raw)?)
    }

    /// Enable or disable registering catalog invokables on first request.
    pub fn set_auto_invokables(&mut self, flag: bool) {
        self.auto_invokables = flag;
    }

    /// The underlying container.
    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Merge more configuration into the manager.
    pub fn configure(&self, config: ServiceConfig) -> Result<&Self> {
        self.container.configure(config)?;
        Ok(self)
    }

    pub fn has(&self, name: &str) -> bool {
        self.container.has(name) || self.can_auto_register(name)
    }

    /// Resolve a plugin, sharing it according to the manager's configuration.
    pub fn get(&self, name: &str) -> Result<Arc<T>> {
        self.auto_register(name)?;
        let instance = self.container.get_any(name)?;
        self.validate(name, instance)
    }

    /// Create a fresh plugin with `options`.
    pub fn build(&self, name: &str, options: Option<&Options>) -> Result<Arc<T>> {
        self.auto_register(name)?;
        let instance = self.container.build_any(name, options)?;
        self.validate(name, instance)
    }

    /// Check that `instance` is a `T`.
    ///
    /// # Errors
    ///
    /// `InvalidService` naming `name` and the plugin type.
    pub fn validate(&self, name: &str, instance: Instance) -> Result<Arc<T>> {
        downcast(name, instance)
    }

    fn can_auto_register(&self, name: &str) -> bool {
        self.auto_invokables && self.container.catalog().contains(ComponentKind::Invokable, name)
    }

    fn auto_register(&self, name: &str) -> Result<()> {
        if self.container.has(name) || !self.can_auto_register(name) {
            return Ok(());
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_locator",
            service = name,
            "Registering catalog invokable in plugin manager"
        );

        self.container.set_factory(name, FactoryRef::invokable())
    }
}

impl<T> fmt::Debug for PluginManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugin", &std::any::type_name::<T>())
            .field("container", &self.container)
            .field("auto_invokables", &self.auto_invokables)
            .finish()
    }
}
