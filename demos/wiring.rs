//! Wiring an application from a JSON configuration
//!
//! Run with: cargo run --example wiring

use serde_json::json;
use service_locator::prelude::*;
use service_locator::{ConfigValidator, LazyService};
use std::sync::atomic::{AtomicUsize, Ordering};

struct Settings {
    dsn: String,
}

impl Invokable for Settings {
    fn invoke(options: Option<&Options>) -> Result<Self> {
        let dsn = options
            .and_then(|o| o.get("dsn"))
            .and_then(|v| v.as_str())
            .unwrap_or("sqlite::memory:");
        Ok(Settings { dsn: dsn.to_owned() })
    }
}

struct Database {
    dsn: String,
}

struct ReportEngine {
    pages: usize,
}

/// Decorator recording every database handed out
struct Timed {
    inner: Arc<Database>,
}

static REPORTS_BUILT: AtomicUsize = AtomicUsize::new(0);

fn catalog() -> Catalog {
    Catalog::new()
        .with_invokable::<Settings>("Settings")
        .with_factory("DatabaseFactory", || {
            |c: &Container, _: &str, _: Option<&Options>| -> Result<Instance> {
                let settings = c.get::<Settings>("settings")?;
                Ok(instance(Database {
                    dsn: settings.dsn.clone(),
                }))
            }
        })
        .with_factory("ReportFactory", || {
            |_: &Container, _: &str, _: Option<&Options>| -> Result<Instance> {
                REPORTS_BUILT.fetch_add(1, Ordering::SeqCst);
                Ok(instance(ReportEngine { pages: 12 }))
            }
        })
        .with_delegator("Timing", || {
            |_: &Container, name: &str, next: Callback, _: Option<&Options>| -> Result<Instance> {
                let inner = next()?
                    .downcast::<Database>()
                    .map_err(|_| DiError::invalid_service::<Database>(name))?;
                println!("  [timing] wrapping {name}");
                Ok(instance(Timed { inner }))
            }
        })
}

fn main() -> Result<()> {
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    service_locator::logging::init()?;

    let config = json!({
        "invokables": { "settings": "Settings" },
        "factories": {
            "Database": "DatabaseFactory",
            "Reports": "ReportFactory"
        },
        "aliases": { "db": "Database" },
        "delegators": {
            "Database": ["Timing"],
            "Reports": ["LazyServiceFactory"]
        },
        "lazy_services": { "class_map": { "Reports": "ReportEngine" } }
    });

    let catalog = catalog();
    ConfigValidator::new(&catalog).assert_is_valid_configuration(&config)?;

    let container = Container::with_catalog(catalog);
    container.configure_json(&config)?;

    println!("=== Aliases and delegators ===");
    let timed = container.get::<Timed>("db")?;
    println!("  db -> {}", timed.inner.dsn);
    assert!(Arc::ptr_eq(&timed, &container.get::<Timed>("Database")?));

    println!("=== Build with options ===");
    let mut options = Options::new();
    options.insert("dsn".into(), "postgres://localhost/app".into());
    let custom = container.build::<Settings>("settings", Some(&options))?;
    println!("  built settings with {}", custom.dsn);

    println!("=== Lazy services ===");
    let proxy = container.get::<LazyService>("Reports")?;
    println!(
        "  proxy for {} ({}), initialized: {}",
        proxy.name(),
        proxy.class_name(),
        proxy.is_initialized()
    );
    let engine = proxy.get::<ReportEngine>()?;
    println!(
        "  engine ready with {} pages, built {} time(s)",
        engine.pages,
        REPORTS_BUILT.load(Ordering::SeqCst)
    );

    println!("=== Plugin manager ===");
    let plugins = PluginManager::<Settings>::new(&container, ServiceConfig::new())?;
    println!("  has Settings plugin: {}", plugins.has("Settings"));
    println!("  plugin dsn: {}", plugins.get("Settings")?.dsn);

    Ok(())
}
