//! # Service Locator - String-Keyed Dependency Injection for Rust
//!
//! A service container that resolves names to instances through pluggable
//! construction strategies.
//!
//! ## Features
//!
//! - **Factories** - one factory per name, referenced by catalog name or passed as a closure
//! - **Abstract factories** - predicate-driven fallbacks, consulted in registration order
//! - **Aliases** - multi-hop indirection with eager cycle detection
//! - **Delegators** - ordered decorators wrapping a service's creation
//! - **Initializers** - hooks run on every freshly created instance
//! - **Lazy services** - proxies that defer creation until first use
//! - **Sharing policy** - per-name and container-wide singleton caching
//! - **Configuration** - typed `ServiceConfig` builder or a `serde_json` map, validated up front
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use service_locator::{Container, FactoryRef, instance};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserRepository {
//!     db: std::sync::Arc<Database>,
//! }
//!
//! let container = Container::new();
//!
//! container
//!     .set_service("Database", Database { url: "postgres://localhost".into() })
//!     .unwrap();
//! container
//!     .set_factory(
//!         "UserRepository",
//!         FactoryRef::from_fn(|c, _, _| {
//!             let db = c.get::<Database>("Database")?;
//!             Ok(instance(UserRepository { db }))
//!         }),
//!     )
//!     .unwrap();
//! container.set_alias("users", "UserRepository").unwrap();
//!
//! let users = container.get::<UserRepository>("users").unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Configuration
//!
//! Named references in configuration resolve through a [`Catalog`].
//!
//! ```rust
//! use serde_json::json;
//! use service_locator::{Catalog, Container, Invokable, Options, Result};
//!
//! struct Clock;
//!
//! impl Invokable for Clock {
//!     fn invoke(_: Option<&Options>) -> Result<Self> {
//!         Ok(Clock)
//!     }
//! }
//!
//! let container = Container::with_catalog(Catalog::new().with_invokable::<Clock>("Clock"));
//! container
//!     .configure_json(&json!({
//!         "invokables": { "clock": "Clock" },
//!         "shared": { "Clock": false }
//!     }))
//!     .unwrap();
//!
//! let a = container.get::<Clock>("clock").unwrap();
//! let b = container.get::<Clock>("clock").unwrap();
//! assert!(!std::sync::Arc::ptr_eq(&a, &b));
//! ```

mod alias;
mod catalog;
mod config;
mod container;
mod delegator;
mod error;
mod factory;
mod lazy;
#[cfg(feature = "logging")]
pub mod logging;
mod plugin;
mod provider;
mod registry;
mod resolver;
mod validator;

pub use alias::AliasGraph;
pub use catalog::*;
pub use config::ServiceConfig;
pub use container::Container;
pub use error::*;
pub use factory::*;
pub use lazy::*;
pub use plugin::PluginManager;
pub use provider::*;
pub use validator::ConfigValidator;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AbstractFactory, AbstractFactoryRef, Callback, Catalog, Container, Delegator,
        DelegatorRef, DiError, Factory, FactoryRef, Initializer, InitializerRef, Instance,
        Invokable, Options, PluginManager, Result, ServiceConfig, instance,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Mailer {
        transport: Arc<String>,
    }

    struct Audited {
        inner: Instance,
    }

    #[test]
    fn test_catalog_wired_end_to_end() {
        static CREATED: AtomicU32 = AtomicU32::new(0);

        let catalog = Catalog::new()
            .with_factory("MailerFactory", || {
                |c: &Container, _: &str, _: Option<&Options>| -> Result<Instance> {
                    CREATED.fetch_add(1, Ordering::SeqCst);
                    let transport = c.get::<String>("transport")?;
                    Ok(instance(Mailer { transport }))
                }
            })
            .with_delegator("Audit", || {
                |_: &Container, _: &str, next: Callback, _: Option<&Options>| -> Result<Instance> {
                    Ok(instance(Audited { inner: next()? }))
                }
            });

        let container = Container::from_config(
            catalog,
            ServiceConfig::from_json(&json!({
                "services": { "settings": { "retries": 3 } },
                "factories": { "Mailer": "MailerFactory" },
                "aliases": { "mail": "Mailer", "mailer": "mail" },
                "delegators": { "Mailer": ["Audit"] }
            }))
            .unwrap(),
        )
        .unwrap();
        container.set_service("transport", String::from("smtp")).unwrap();

        let audited = container.get::<Audited>("mailer").unwrap();
        let mailer = audited.inner.clone().downcast::<Mailer>().unwrap();
        assert_eq!(*mailer.transport, "smtp");

        // Cached under every name used
        assert!(Arc::ptr_eq(&audited, &container.get::<Audited>("Mailer").unwrap()));
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);

        let settings = container.get::<serde_json::Value>("settings").unwrap();
        assert_eq!(settings["retries"], 3);
    }

    #[test]
    fn test_not_found_error() {
        let container = Container::new();
        let err = container.get::<String>("nothing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to resolve service \"nothing\": no factory or abstract factory is \
             registered for it; are you certain you provided it during configuration?"
        );
    }

    #[test]
    fn test_clones_share_the_registry() {
        let container = Container::new();
        let handle = container.clone();
        handle.set_service("answer", 42_u32).unwrap();

        assert_eq!(*container.get::<u32>("answer").unwrap(), 42);
    }

    #[test]
    fn test_concurrent_get_of_shared_service() {
        let container = Container::new();
        container
            .set_factory(
                "Counter",
                FactoryRef::from_fn(|_: &Container, _: &str, _: Option<&Options>| {
                    Ok(instance(AtomicU32::new(0)))
                }),
            )
            .unwrap();
        let first = container.get::<AtomicU32>("Counter").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let container = container.clone();
                std::thread::spawn(move || {
                    let counter = container.get::<AtomicU32>("Counter").unwrap();
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(first.load(Ordering::SeqCst), 4);
    }
}
