//! Delegator chains
//!
//! The first registered delegator receives a callback that runs the
//! service's factory; every later delegator receives a callback running the
//! delegator before it. The outermost result is what callers see.

use crate::container::WeakContainer;
use crate::factory::{Callback, Delegator};
use crate::registry::DelegatorEntry;
use crate::resolver::Resolver;
use crate::{Container, DiError, Instance, Options, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Nested creation callbacks for one resolved name.
pub(crate) struct DelegatorChain<'a> {
    container: &'a Container,
    entries: Vec<Arc<DelegatorEntry>>,
}

impl<'a> DelegatorChain<'a> {
    pub(crate) fn new(container: &'a Container, entries: Vec<Arc<DelegatorEntry>>) -> Self {
        Self { container, entries }
    }

    fn materialize(&self, entry: &DelegatorEntry, name: &str) -> Result<Arc<dyn Delegator>> {
        if entry.is_lazy() {
            let lazy: Arc<dyn Delegator> = self.container.registry().lazy_delegator(name)?;
            return Ok(lazy);
        }
        entry.materialize(self.container.catalog(), name)
    }

    /// Run the chain for `name`.
    pub(crate) fn create(self, name: &str, options: Option<&Options>) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: "service_locator",
            service = name,
            delegator_count = self.entries.len(),
            "Creating service through delegators"
        );

        let handle = self.container.downgrade();
        let base = handle.clone();
        let base_name = name.to_owned();
        let base_options = options.cloned();
        let mut callback: Callback = Box::new(move || {
            let container = upgrade(&base, &base_name)?;
            Resolver::new(&container).create(&base_name, base_options.as_ref())
        });

        for entry in &self.entries {
            let delegator = self.materialize(entry, name)?;
            let handle = handle.clone();
            let name = name.to_owned();
            let options = options.cloned();
            let inner = callback;
            callback = Box::new(move || {
                let container = upgrade(&handle, &name)?;
                delegator.delegate(container.context(), &name, inner, options.as_ref())
            });
        }

        callback()
    }
}

fn upgrade(handle: &WeakContainer, name: &str) -> Result<Container> {
    handle.upgrade().ok_or_else(|| {
        DiError::not_created(name, "the container was dropped before the service was created")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DelegatorRef, FactoryRef, instance};
    use parking_lot::Mutex;

    fn base(_: &Container, _: &str, _: Option<&Options>) -> Result<Instance> {
        Ok(instance(String::from("base")))
    }

    fn wrap(tag: &'static str) -> DelegatorRef {
        DelegatorRef::from_fn(move |_: &Container, _: &str, next: Callback, _: Option<&Options>| {
            let inner = next()?;
            let inner = inner.downcast_ref::<String>().cloned().unwrap_or_default();
            Ok(instance(format!("{tag}({inner})")))
        })
    }

    #[test]
    fn test_last_registered_is_outermost() {
        let container = Container::new();
        container.set_factory("Svc", FactoryRef::from_fn(base)).unwrap();
        container.add_delegator("Svc", wrap("d1")).unwrap();
        container.add_delegator("Svc", wrap("d2")).unwrap();

        let entries = container.registry().delegators("Svc");
        let built = DelegatorChain::new(&container, entries).create("Svc", None).unwrap();
        assert_eq!(built.downcast_ref::<String>().unwrap(), "d2(d1(base))");
    }

    #[test]
    fn test_delegator_may_skip_the_factory() {
        let container = Container::new();
        container
            .set_factory(
                "Svc",
                FactoryRef::from_fn(|_: &Container, _: &str, _: Option<&Options>| -> Result<Instance> {
                    Err(DiError::custom("factory must not run"))
                }),
            )
            .unwrap();
        container
            .add_delegator(
                "Svc",
                DelegatorRef::from_fn(|_: &Container, _: &str, _: Callback, _: Option<&Options>| {
                    Ok(instance(7_i32))
                }),
            )
            .unwrap();

        let entries = container.registry().delegators("Svc");
        let built = DelegatorChain::new(&container, entries).create("Svc", None).unwrap();
        assert_eq!(*built.downcast_ref::<i32>().unwrap(), 7);
    }

    #[test]
    fn test_options_reach_every_link() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        let container = Container::new();
        container
            .set_factory(
                "Svc",
                FactoryRef::from_fn(|_: &Container, _: &str, options: Option<&Options>| {
                    Ok(instance(options.cloned().unwrap_or_default()))
                }),
            )
            .unwrap();
        container
            .add_delegator(
                "Svc",
                DelegatorRef::from_fn(move |_: &Container, _: &str, next: Callback, options: Option<&Options>| {
                    log.lock().push(options.map(|o| o.len()).unwrap_or(0));
                    next()
                }),
            )
            .unwrap();

        let mut options = Options::new();
        options.insert("foo".into(), "bar".into());

        let entries = container.registry().delegators("Svc");
        let built = DelegatorChain::new(&container, entries)
            .create("Svc", Some(&options))
            .unwrap();

        assert_eq!(built.downcast_ref::<Options>().unwrap()["foo"], "bar");
        assert_eq!(*seen.lock(), [1]);
    }
}
