//! Error types for the service locator

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Shared, type-erased error raised by user code (factories, delegators, initializers).
pub type BoxError = Arc<dyn StdError + Send + Sync>;

/// Errors that can occur while configuring the container or resolving services
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No service, factory or abstract factory could be located for a name
    #[error("Unable to resolve service \"{name}\": {reason}")]
    NotFound { name: String, reason: String },

    /// A factory, delegator or initializer failed while building a service
    #[error("Service with name \"{name}\" could not be created. Reason: {reason}")]
    NotCreated {
        name: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The alias definitions contain a cycle
    #[error("A cycle was detected within the aliases definitions: {}", .cycle.join(" -> "))]
    CyclicAlias { cycle: Vec<String> },

    /// A mutation targeted a live service while overrides are disabled
    #[error(
        "The container does not allow replacing or updating a service with existing instances; \
         the following already exist in the container: {name}"
    )]
    ModificationNotAllowed { name: String },

    /// Configuration has the wrong shape or references unknown components
    #[error("Invalid configuration at \"{key}\": {reason}")]
    InvalidConfiguration { key: String, reason: String },

    /// A resolved instance is not of the requested type
    #[error("Service \"{name}\" is not an instance of {expected}")]
    InvalidService {
        name: String,
        expected: &'static str,
    },

    /// Error raised by user code; wrapped into `NotCreated` by the container
    #[error(transparent)]
    Other(BoxError),
}

impl DiError {
    /// Create a NotFound error for a name nothing can build
    #[inline]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            reason: "no factory or abstract factory is registered for it; \
                     are you certain you provided it during configuration?"
                .into(),
        }
    }

    /// Create a NotFound error with a specific reason
    #[inline]
    pub fn not_found_because(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a NotCreated error without an underlying source
    #[inline]
    pub fn not_created(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotCreated {
            name: name.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a CyclicAlias error from the discovered path
    #[inline]
    pub fn cyclic_alias<I, S>(cycle: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::CyclicAlias {
            cycle: cycle.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a ModificationNotAllowed error
    #[inline]
    pub fn modification_not_allowed(name: impl Into<String>) -> Self {
        Self::ModificationNotAllowed { name: name.into() }
    }

    /// Create an InvalidConfiguration error
    #[inline]
    pub fn invalid_configuration(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidService error for a type
    #[inline]
    pub fn invalid_service<T: 'static>(name: impl Into<String>) -> Self {
        Self::InvalidService {
            name: name.into(),
            expected: std::any::type_name::<T>(),
        }
    }

    /// Wrap any foreign error raised by user code
    #[inline]
    pub fn other<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self::Other(Arc::new(error))
    }

    /// Wrap a plain message raised by user code
    #[inline]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Other(Arc::new(Message(message.into())))
    }

    /// Whether this error was raised by user code rather than the container
    #[inline]
    pub fn is_foreign(&self) -> bool {
        matches!(self, Self::Other(_))
    }

    /// Translate a failure raised while building `name`.
    ///
    /// Foreign errors are wrapped into `NotCreated`; errors of the container's
    /// own family pass through untouched.
    pub(crate) fn while_creating(self, name: &str) -> Self {
        match self {
            Self::Other(source) => Self::NotCreated {
                name: name.to_owned(),
                reason: source.to_string(),
                source: Some(source),
            },
            other => other,
        }
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, DiError>;
