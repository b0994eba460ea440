//! Container configuration
//!
//! [`ServiceConfig`] is the typed form of everything `Container::configure`
//! merges. It can be assembled with builder methods or parsed from the raw
//! `serde_json::Value` configuration map.

use crate::factory::{AbstractFactoryRef, DelegatorRef, FactoryRef, InitializerRef};
use crate::{DiError, Injectable, Instance, Result, instance};
use ahash::RandomState;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A configuration batch for [`Container::configure`](crate::Container::configure).
///
/// # Examples
///
/// ```rust
/// use service_locator::{Container, FactoryRef, ServiceConfig};
///
/// let config = ServiceConfig::new()
///     .service("greeting", String::from("hello"))
///     .alias("hello", "greeting")
///     .shared("greeting", true);
///
/// let container = Container::new();
/// container.configure(config).unwrap();
/// assert_eq!(*container.get::<String>("hello").unwrap(), "hello");
/// ```
#[derive(Clone, Default)]
pub struct ServiceConfig {
    pub(crate) services: HashMap<String, Instance, RandomState>,
    pub(crate) factories: HashMap<String, FactoryRef, RandomState>,
    pub(crate) invokables: HashMap<String, String, RandomState>,
    pub(crate) aliases: HashMap<String, String, RandomState>,
    pub(crate) delegators: HashMap<String, Vec<DelegatorRef>, RandomState>,
    pub(crate) initializers: Vec<InitializerRef>,
    pub(crate) abstract_factories: Vec<AbstractFactoryRef>,
    pub(crate) shared: HashMap<String, bool, RandomState>,
    pub(crate) shared_by_default: Option<bool>,
    pub(crate) lazy_class_map: HashMap<String, String, RandomState>,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pre-built service.
    pub fn service<T: Injectable>(self, name: impl Into<String>, value: T) -> Self {
        self.service_instance(name, instance(value))
    }

    /// Add a pre-built, already type-erased service.
    pub fn service_instance(mut self, name: impl Into<String>, value: Instance) -> Self {
        self.services.insert(name.into(), value);
        self
    }

    pub fn factory(mut self, name: impl Into<String>, factory: impl Into<FactoryRef>) -> Self {
        self.factories.insert(name.into(), factory.into());
        self
    }

    /// Register `class` as an invokable buildable as `name`.
    ///
    /// When the names differ, `name` becomes an alias of `class`.
    pub fn invokable(mut self, name: impl Into<String>, class: impl Into<String>) -> Self {
        self.invokables.insert(name.into(), class.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    /// Append a delegator for `name`.
    pub fn delegator(mut self, name: impl Into<String>, delegator: impl Into<DelegatorRef>) -> Self {
        self.delegators
            .entry(name.into())
            .or_default()
            .push(delegator.into());
        self
    }

    pub fn initializer(mut self, initializer: impl Into<InitializerRef>) -> Self {
        self.initializers.push(initializer.into());
        self
    }

    pub fn abstract_factory(mut self, factory: impl Into<AbstractFactoryRef>) -> Self {
        self.abstract_factories.push(factory.into());
        self
    }

    pub fn shared(mut self, name: impl Into<String>, flag: bool) -> Self {
        self.shared.insert(name.into(), flag);
        self
    }

    pub fn shared_by_default(mut self, flag: bool) -> Self {
        self.shared_by_default = Some(flag);
        self
    }

    /// Map `name` in the lazy-service class map.
    pub fn lazy_service(mut self, name: impl Into<String>, class: impl Into<String>) -> Self {
        self.lazy_class_map.insert(name.into(), class.into());
        self
    }

    /// Whether this batch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.factories.is_empty()
            && self.invokables.is_empty()
            && self.aliases.is_empty()
            && self.delegators.is_empty()
            && self.initializers.is_empty()
            && self.abstract_factories.is_empty()
            && self.shared.is_empty()
            && self.shared_by_default.is_none()
            && self.lazy_class_map.is_empty()
    }

    /// Names this batch would write to, for the override check.
    pub(crate) fn touched_names(&self) -> impl Iterator<Item = &str> {
        self.services
            .keys()
            .chain(self.aliases.keys())
            .chain(self.invokables.keys())
            .chain(self.factories.keys())
            .chain(self.delegators.keys())
            .chain(self.shared.keys())
            .chain(self.lazy_class_map.keys())
            .map(String::as_str)
    }

    /// Parse the raw configuration map.
    ///
    /// Recognized keys are `services`, `factories`, `invokables`, `aliases`,
    /// `delegators`, `initializers`, `abstract_factories`, `shared`,
    /// `shared_by_default` and `lazy_services`; anything else is ignored.
    /// Entries under `services` are stored as `serde_json::Value` instances.
    /// Component references are catalog names.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` naming the first key with the wrong shape.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_json::json;
    /// use service_locator::ServiceConfig;
    ///
    /// let config = ServiceConfig::from_json(&json!({
    ///     "factories": { "Mailer": "InvokableFactory" },
    ///     "aliases": { "mail": "Mailer" },
    ///     "shared": { "Mailer": false }
    /// }))
    /// .unwrap();
    /// assert!(!config.is_empty());
    ///
    /// assert!(ServiceConfig::from_json(&json!({ "aliases": ["oops"] })).is_err());
    /// ```
    pub fn from_json(raw: &Value) -> Result<Self> {
        let root = raw
            .as_object()
            .ok_or_else(|| DiError::invalid_configuration("", "configuration must be an object"))?;

        let mut config = Self::new();

        for (key, value) in root {
            match key.as_str() {
                "services" => {
                    for (name, service) in object(value, key)? {
                        config
                            .services
                            .insert(name.clone(), Arc::new(service.clone()) as Instance);
                    }
                }
                "factories" => {
                    for (name, factory) in string_map(value, key)? {
                        config.factories.insert(name, FactoryRef::Named(factory));
                    }
                }
                "invokables" => config.invokables.extend(string_map(value, key)?),
                "aliases" => config.aliases.extend(string_map(value, key)?),
                "delegators" => {
                    for (name, list) in object(value, key)? {
                        let path = format!("{key}.{name}");
                        let names = string_list(list, &path)?;
                        config
                            .delegators
                            .insert(name.clone(), names.into_iter().map(DelegatorRef::Named).collect());
                    }
                }
                "initializers" => {
                    config
                        .initializers
                        .extend(string_list(value, key)?.into_iter().map(InitializerRef::Named));
                }
                "abstract_factories" => {
                    config
                        .abstract_factories
                        .extend(string_list(value, key)?.into_iter().map(AbstractFactoryRef::Named));
                }
                "shared" => {
                    for (name, flag) in object(value, key)? {
                        let flag = flag.as_bool().ok_or_else(|| {
                            DiError::invalid_configuration(format!("{key}.{name}"), "expected a boolean")
                        })?;
                        config.shared.insert(name.clone(), flag);
                    }
                }
                "shared_by_default" => {
                    let flag = value
                        .as_bool()
                        .ok_or_else(|| DiError::invalid_configuration(key, "expected a boolean"))?;
                    config.shared_by_default = Some(flag);
                }
                "lazy_services" => config.lazy_class_map.extend(lazy_services(value)?),
                _ => {}
            }
        }

        Ok(config)
    }
}

fn object<'v>(value: &'v Value, key: &str) -> Result<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| DiError::invalid_configuration(key, "expected an object"))
}

fn string_map(value: &Value, key: &str) -> Result<Vec<(String, String)>> {
    object(value, key)?
        .iter()
        .map(|(name, target)| {
            target
                .as_str()
                .map(|t| (name.clone(), t.to_owned()))
                .ok_or_else(|| DiError::invalid_configuration(format!("{key}.{name}"), "expected a string"))
        })
        .collect()
}

fn string_list(value: &Value, key: &str) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| DiError::invalid_configuration(key, "expected an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| DiError::invalid_configuration(format!("{key}[{i}]"), "expected a string"))
        })
        .collect()
}

/// The class map of a `lazy_services` block.
///
/// Proxy generation settings are accepted and shape-checked but have no
/// effect.
fn lazy_services(value: &Value) -> Result<Vec<(String, String)>> {
    let block = object(value, "lazy_services")?;
    let mut class_map = Vec::new();

    for (key, entry) in block {
        let path = format!("lazy_services.{key}");
        match key.as_str() {
            "class_map" => class_map = string_map(entry, &path)?,
            "proxies_target_dir" | "proxies_namespace" => {
                if !entry.is_string() {
                    return Err(DiError::invalid_configuration(path, "expected a string"));
                }
            }
            "write_proxy_files" => {
                if !entry.is_boolean() {
                    return Err(DiError::invalid_configuration(path, "expected a boolean"));
                }
            }
            _ => {}
        }
    }

    Ok(class_map)
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("factories", &self.factories)
            .field("invokables", &self.invokables)
            .field("aliases", &self.aliases)
            .field("delegators", &self.delegators)
            .field("initializers", &self.initializers)
            .field("abstract_factories", &self.abstract_factories)
            .field("shared", &self.shared)
            .field("shared_by_default", &self.shared_by_default)
            .field("lazy_class_map", &self.lazy_class_map)
            .finish()
    }
}
