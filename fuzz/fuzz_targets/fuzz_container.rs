#![no_main]

//! Fuzz target for container resolution
//!
//! Interleaves registrations and lookups and checks that `has` agrees with
//! whether `get` reports NotFound, and that anything found once stays resolvable.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use service_locator::{
    AbstractFactoryRef, Container, DiError, FactoryRef, FnAbstractFactory, Options, instance,
};

fn name(id: u8) -> String {
    format!("s{}", id % 6)
}

#[derive(Debug, Arbitrary)]
enum ContainerOp {
    SetService(u8, u32),
    SetFactory(u8),
    SetAlias(u8, u8),
    SetShared(u8, bool),
    AddPrefixFactory,
    Get(u8),
    Build(u8),
    Has(u8),
}

fn factory() -> FactoryRef {
    FactoryRef::from_fn(|_: &Container, name: &str, _: Option<&Options>| {
        Ok(instance(name.to_owned()))
    })
}

fuzz_target!(|ops: Vec<ContainerOp>| {
    let container = Container::new();

    for op in ops {
        match op {
            ContainerOp::SetService(id, value) => {
                let _ = container.set_service(&name(id), value);
            }
            ContainerOp::SetFactory(id) => {
                let _ = container.set_factory(&name(id), factory());
            }
            ContainerOp::SetAlias(alias, target) => {
                match container.set_alias(&name(alias), &name(target)) {
                    Ok(()) | Err(DiError::CyclicAlias { .. }) => {}
                    Err(DiError::ModificationNotAllowed { .. }) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            ContainerOp::SetShared(id, flag) => {
                let _ = container.set_shared(&name(id), flag);
            }
            ContainerOp::AddPrefixFactory => {
                container
                    .add_abstract_factory(AbstractFactoryRef::instance(FnAbstractFactory::new(
                        |_: &Container, name: &str| name.ends_with('5'),
                        |_: &Container, name: &str, _: Option<&Options>| {
                            Ok(instance(name.to_owned()))
                        },
                    )))
                    .unwrap();
            }
            ContainerOp::Get(id) => {
                let name = name(id);
                let predicted = container.has(&name);
                match container.get_any(&name) {
                    Ok(_) => {
                        assert!(predicted, "has({name}) was false but get succeeded");
                        // Whatever was found once stays resolvable
                        container.get_any(&name).unwrap();
                    }
                    Err(DiError::NotFound { .. }) => {
                        assert!(!predicted, "has({name}) was true but get found nothing");
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            ContainerOp::Build(id) => {
                // Pre-built services have no factory, so NotFound is allowed here
                match container.build_any(&name(id), None) {
                    Ok(_) | Err(DiError::NotFound { .. }) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            ContainerOp::Has(id) => {
                let _ = container.has(&name(id));
            }
        }
    }
});
