//! Lazy services
//!
//! Services listed in the `lazy_services` class map can be decorated with the
//! `LazyServiceFactory` delegator. Instead of building the service, the
//! delegator hands out a [`LazyService`] proxy that keeps the creation
//! callback and runs it the first time the real instance is needed.

use crate::factory::{Callback, Delegator};
use crate::{Container, DiError, Injectable, Instance, Options, Result};
use ahash::RandomState;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Delegator name that stands for the lazy-service delegator.
pub const LAZY_SERVICE_DELEGATOR: &str = "LazyServiceFactory";

/// Delegator producing [`LazyService`] proxies for names in its class map.
pub struct LazyServiceDelegator {
    class_map: HashMap<String, String, RandomState>,
}

impl LazyServiceDelegator {
    pub(crate) fn new(class_map: HashMap<String, String, RandomState>) -> Self {
        Self { class_map }
    }

    /// The proxied type label for `name`, if it is a lazy service.
    #[inline]
    pub fn class_of(&self, name: &str) -> Option<&str> {
        self.class_map.get(name).map(String::as_str)
    }
}

impl Delegator for LazyServiceDelegator {
    fn delegate(
        &self,
        _container: &Container,
        name: &str,
        callback: Callback,
        _options: Option<&Options>,
    ) -> Result<Instance> {
        let class = self.class_of(name).ok_or_else(|| {
            DiError::not_found_because(
                name,
                "the service is not listed in the lazy_services class map",
            )
        })?;

        #[cfg(feature = "logging")]
        trace!(
            target: "service_locator",
            service = name,
            class = class,
            "Handing out lazy service proxy"
        );

        Ok(Arc::new(LazyService::new(name, class, callback)))
    }
}

impl fmt::Debug for LazyServiceDelegator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyServiceDelegator")
            .field("class_map", &self.class_map.len())
            .finish()
    }
}

/// Proxy for a service that is built on first access.
///
/// # Examples
///
/// ```rust
/// use service_locator::{Container, DelegatorRef, FactoryRef, LazyService, instance};
///
/// let container = Container::new();
/// container
///     .set_factory("Report", FactoryRef::from_fn(|_, _, _| Ok(instance(42_u32))))
///     .unwrap();
/// container.map_lazy_service("Report", None).unwrap();
/// container.add_delegator("Report", DelegatorRef::lazy()).unwrap();
///
/// let proxy = container.get::<LazyService>("Report").unwrap();
/// assert!(!proxy.is_initialized());
///
/// assert_eq!(*proxy.get::<u32>().unwrap(), 42);
/// assert!(proxy.is_initialized());
/// ```
pub struct LazyService {
    name: String,
    class: String,
    init: Mutex<Option<Callback>>,
    instance: OnceCell<Instance>,
}

impl LazyService {
    fn new(name: &str, class: &str, callback: Callback) -> Self {
        Self {
            name: name.to_owned(),
            class: class.to_owned(),
            init: Mutex::new(Some(callback)),
            instance: OnceCell::new(),
        }
    }

    /// The service name this proxy stands for.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type label from the class map.
    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// Whether the real instance has been created.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }

    /// The real instance, created on first call.
    ///
    /// A failed creation consumes the callback; later calls report NotCreated.
    pub fn instance(&self) -> Result<Instance> {
        self.instance
            .get_or_try_init(|| {
                let callback = self.init.lock().take().ok_or_else(|| {
                    DiError::not_created(&self.name, "a previous lazy initialization failed")
                })?;

                #[cfg(feature = "logging")]
                debug!(
                    target: "service_locator",
                    service = self.name.as_str(),
                    class = self.class.as_str(),
                    "Initializing lazy service"
                );

                callback().map_err(|e| e.while_creating(&self.name))
            })
            .cloned()
    }

    /// The real instance downcast to `T`.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        self.instance()?
            .downcast::<T>()
            .map_err(|_| DiError::invalid_service::<T>(&self.name))
    }
}

impl fmt::Debug for LazyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyService")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn delegator(pairs: &[(&str, &str)]) -> LazyServiceDelegator {
        LazyServiceDelegator::new(
            pairs
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_proxy_defers_creation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: Callback = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(instance(String::from("heavy")))
        });

        let container = Container::new();
        let proxy = delegator(&[("Heavy", "HeavyService")])
            .delegate(&container, "Heavy", callback, None)
            .unwrap();
        let proxy = proxy.downcast::<LazyService>().unwrap();

        assert_eq!(proxy.class_name(), "HeavyService");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let a = proxy.get::<String>().unwrap();
        let b = proxy.get::<String>().unwrap();
        assert_eq!(*a, "heavy");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unmapped_name_is_not_found() {
        let callback: Callback = Box::new(|| Ok(instance(())));
        let err = delegator(&[("Heavy", "HeavyService")])
            .delegate(&Container::new(), "Light", callback, None)
            .unwrap_err();
        assert!(matches!(err, DiError::NotFound { ref name, .. } if name == "Light"));
    }

    #[test]
    fn test_failed_initialization_is_not_retried() {
        let callback: Callback = Box::new(|| Err(DiError::custom("boom")));
        let proxy = LazyService::new("Heavy", "HeavyService", callback);

        let first = proxy.instance().unwrap_err();
        assert!(matches!(first, DiError::NotCreated { ref reason, .. } if reason == "boom"));

        let second = proxy.instance().unwrap_err();
        assert!(matches!(second, DiError::NotCreated { .. }));
        assert!(!proxy.is_initialized());
    }

    #[test]
    fn test_wrong_type_is_invalid_service() {
        let callback: Callback = Box::new(|| Ok(instance(1_u8)));
        let proxy = LazyService::new("Heavy", "HeavyService", callback);
        assert!(matches!(
            proxy.get::<String>(),
            Err(DiError::InvalidService { .. })
        ));
    }
}
