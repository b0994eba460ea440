//! Factory location
//!
//! A resolved name is built by its direct factory if it has one; otherwise
//! the abstract factories are asked in registration order and the first one
//! that accepts the name builds it.

use crate::factory::{AbstractFactory, Factory};
use crate::{Container, DiError, Instance, Options, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// The factory chosen to build a name.
pub(crate) enum FactoryHandle {
    Direct(Arc<dyn Factory>),
    Abstract(Arc<dyn AbstractFactory>),
}

impl FactoryHandle {
    #[inline]
    pub(crate) fn create(
        &self,
        context: &Container,
        name: &str,
        options: Option<&Options>,
    ) -> Result<Instance> {
        match self {
            Self::Direct(factory) => factory.create(context, name, options),
            Self::Abstract(factory) => factory.create(context, name, options),
        }
    }
}

/// Looks factories up in a container's registry.
pub(crate) struct Resolver<'a> {
    container: &'a Container,
}

impl<'a> Resolver<'a> {
    #[inline]
    pub(crate) fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Locate the factory for `resolved`.
    pub(crate) fn factory_for(&self, resolved: &str) -> Result<FactoryHandle> {
        let registry = self.container.registry();

        if let Some(entry) = registry.factory(resolved) {
            let factory = entry.materialize(self.container.catalog(), resolved)?;
            return Ok(FactoryHandle::Direct(factory));
        }

        let context = self.container.context();
        for factory in registry.abstract_factories() {
            if factory.can_create(context, resolved) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "service_locator",
                    service = resolved,
                    "Abstract factory accepted service"
                );

                return Ok(FactoryHandle::Abstract(factory));
            }
        }

        Err(DiError::not_found(resolved))
    }

    /// Build `resolved` with its factory, without delegators or initializers.
    pub(crate) fn create(&self, resolved: &str, options: Option<&Options>) -> Result<Instance> {
        let factory = self.factory_for(resolved)?;
        factory.create(self.container.context(), resolved, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AbstractFactoryRef, FactoryRef, FnAbstractFactory, instance};

    fn tagged(tag: &'static str) -> impl Fn(&Container, &str, Option<&Options>) -> Result<Instance> {
        move |_: &Container, _: &str, _: Option<&Options>| Ok(instance(tag))
    }

    #[test]
    fn test_direct_factory_wins_over_abstract() {
        let container = Container::new();
        container
            .add_abstract_factory(AbstractFactoryRef::instance(FnAbstractFactory::new(
                |_: &Container, _: &str| true,
                tagged("abstract"),
            )))
            .unwrap();
        container.set_factory("Svc", FactoryRef::from_fn(tagged("direct"))).unwrap();

        let built = Resolver::new(&container).create("Svc", None).unwrap();
        assert_eq!(*built.downcast_ref::<&str>().unwrap(), "direct");
    }

    #[test]
    fn test_first_accepting_abstract_factory_wins() {
        let container = Container::new();
        for (tag, accepts) in [("never", false), ("first", true), ("second", true)] {
            container
                .add_abstract_factory(AbstractFactoryRef::instance(FnAbstractFactory::new(
                    move |_: &Container, _: &str| accepts,
                    tagged(tag),
                )))
                .unwrap();
        }

        let built = Resolver::new(&container).create("Anything", None).unwrap();
        assert_eq!(*built.downcast_ref::<&str>().unwrap(), "first");
    }

    #[test]
    fn test_nothing_registered_is_not_found() {
        let container = Container::new();
        let err = Resolver::new(&container).factory_for("Ghost").err().unwrap();
        assert!(matches!(err, DiError::NotFound { ref name, .. } if name == "Ghost"));
    }
}
