//! Error types for binding resolution
//!
//! All resolution failures are request-local and surface as rejected
//! resolutions. `ResolveError` is `Clone` because a memoized rejection is
//! replayed to every caller holding the shared resolution future.

use crate::key::BindingKey;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error type accepted from factories and constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while resolving a binding
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// No producer or pre-resolved value for the key, locally or in any
    /// ancestor registry
    #[error("no binding found for {key}")]
    Unresolved {
        /// Key that failed to resolve (type or name form)
        key: BindingKey,
    },

    /// The key was requested while already in-flight on the same resolution
    /// path and no ancestor could break the cycle
    #[error("cycle detected while resolving {key}")]
    Cycle {
        /// Key at which the cycle closed
        key: BindingKey,
    },

    /// A producer (factory or constructor) failed
    #[error("producer for {key} failed: {source}")]
    Production {
        /// Key whose producer failed
        key: BindingKey,
        /// The producer's own error
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A name-keyed value was requested as a type it does not have
    #[error("value bound for {key} is not a {expected}")]
    TypeMismatch {
        /// Key whose value had the wrong type
        key: BindingKey,
        /// Type the caller asked for
        expected: &'static str,
    },
}

impl ResolveError {
    /// Wrap a producer failure for `key`.
    ///
    /// A nested `ResolveError` escaping a producer through `BoxError` (for
    /// example a cycle hit by a factory's own `get`) is unwrapped and
    /// propagated unchanged rather than double-wrapped.
    pub fn production(key: BindingKey, err: BoxError) -> Self {
        match err.downcast::<ResolveError>() {
            Ok(nested) => *nested,
            Err(err) => Self::Production {
                key,
                source: Arc::from(err),
            },
        }
    }

    /// The key the failure is about.
    pub fn key(&self) -> &BindingKey {
        match self {
            Self::Unresolved { key }
            | Self::Cycle { key }
            | Self::Production { key, .. }
            | Self::TypeMismatch { key, .. } => key,
        }
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;
