//! Provider traits for the service locator
//!
//! These traits define what can be stored in the container and what can be
//! constructed by the built-in [`InvokableFactory`](crate::InvokableFactory).

use crate::Result;
use std::any::Any;
use std::sync::Arc;

/// A type-erased service instance as stored and returned by the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Construction options passed through `build` to factories.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Marker trait for types that can be stored in the container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {
    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// A type that can be constructed directly from build options.
///
/// Invokable types are registered in a [`Catalog`](crate::Catalog) under a
/// name and are then buildable through the `InvokableFactory`.
///
/// # Examples
///
/// ```rust
/// use service_locator::{Invokable, Options, Result};
///
/// struct Mailer {
///     host: String,
/// }
///
/// impl Invokable for Mailer {
///     fn invoke(options: Option<&Options>) -> Result<Self> {
///         let host = options
///             .and_then(|o| o.get("host"))
///             .and_then(|v| v.as_str())
///             .unwrap_or("localhost");
///         Ok(Mailer { host: host.to_owned() })
///     }
/// }
/// ```
pub trait Invokable: Injectable + Sized {
    /// Construct a fresh instance.
    fn invoke(options: Option<&Options>) -> Result<Self>;
}

/// Wrap a value into a type-erased [`Instance`].
#[inline]
pub fn instance<T: Injectable>(value: T) -> Instance {
    Arc::new(value)
}
