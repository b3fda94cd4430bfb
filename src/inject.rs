//! The injector: dependency-list resolution and positional construction
//!
//! A [`Construct`] type declares an ordered dependency list and receives the
//! resolved values positionally through an [`Args`] cursor. Construction is
//! never memoized here; the memoization boundary is the binding, handled by
//! the resolver.

use crate::error::{BoxError, ResolveError, Result};
use crate::key::{BindingKey, InjectKey};
use crate::resolver::{Deferred, Resolver};
use crate::storage::{downcast_checked, Value};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::trace;

/// A type the injector can construct.
///
/// `dependencies` declares an ordered list of binding keys, each optionally
/// marked deferred; `construct` consumes the resolved values positionally,
/// in declared order. The dependency list reaching the injector is assumed
/// well-formed; arity or type mismatches between the list and the
/// constructor surface as errors rather than being checked up front.
///
/// # Examples
///
/// ```rust
/// use bindery::{async_trait, Args, BoxError, Construct, InjectKey};
/// use std::sync::Arc;
///
/// struct Config { url: String }
///
/// struct Database { config: Arc<Config> }
///
/// #[async_trait]
/// impl Construct for Database {
///     fn dependencies() -> Vec<InjectKey> {
///         vec![InjectKey::of::<Config>()]
///     }
///
///     async fn construct(mut args: Args) -> Result<Self, BoxError> {
///         Ok(Self { config: args.take::<Config>()? })
///     }
/// }
/// ```
#[async_trait]
pub trait Construct: Send + Sync + Sized + 'static {
    /// Ordered dependency declaration. Defaults to no dependencies.
    fn dependencies() -> Vec<InjectKey> {
        Vec::new()
    }

    /// Build an instance from the positionally resolved arguments.
    async fn construct(args: Args) -> std::result::Result<Self, BoxError>;
}

/// Errors raised by the positional [`Args`] cursor
#[derive(Error, Debug)]
pub enum ArgError {
    /// The constructor consumed more arguments than were declared
    #[error("{target} consumed more arguments than its dependency list declares")]
    Exhausted {
        /// Type whose constructor over-consumed
        target: &'static str,
    },

    /// `take` was called on a dependency declared deferred
    #[error("dependency {key} was declared deferred; use take_deferred")]
    ExpectedDeferred {
        /// The deferred dependency's key
        key: BindingKey,
    },

    /// `take_deferred` was called on a dependency not declared deferred
    #[error("dependency {key} was not declared deferred")]
    NotDeferred {
        /// The plain dependency's key
        key: BindingKey,
    },
}

enum Injected {
    Ready(Value),
    Deferred(Resolver, BindingKey),
}

/// Positional cursor over a target's resolved dependencies, in declared
/// order.
pub struct Args {
    target: &'static str,
    entries: std::vec::IntoIter<(InjectKey, Injected)>,
}

impl Args {
    fn new(target: &'static str, entries: Vec<(InjectKey, Injected)>) -> Self {
        Self {
            target,
            entries: entries.into_iter(),
        }
    }

    fn next_entry(&mut self) -> std::result::Result<(InjectKey, Injected), ArgError> {
        self.entries.next().ok_or(ArgError::Exhausted {
            target: self.target,
        })
    }

    /// Take the next declared dependency as an eagerly resolved value.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> std::result::Result<Arc<T>, BoxError> {
        match self.next_entry()? {
            (key, Injected::Ready(value)) => Ok(downcast_checked::<T>(&key.key, value)?),
            (key, Injected::Deferred(..)) => {
                Err(ArgError::ExpectedDeferred { key: key.key }.into())
            }
        }
    }

    /// Take the next declared dependency as a pending-value handle.
    pub fn take_deferred<T: Send + Sync + 'static>(
        &mut self,
    ) -> std::result::Result<Deferred<T>, BoxError> {
        match self.next_entry()? {
            (key, Injected::Deferred(resolver, key_inner)) => {
                debug_assert_eq!(key.key, key_inner);
                Ok(Deferred::new(resolver, key_inner))
            }
            (key, Injected::Ready(_)) => Err(ArgError::NotDeferred { key: key.key }.into()),
        }
    }

    /// Number of declared dependencies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("target", &self.target)
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Resolve `T`'s declared dependencies under `resolver` and invoke its
/// constructor. Plain keys are awaited in declared order before
/// construction; deferred keys become handles without resolving anything.
pub(crate) async fn instantiate<T: Construct>(resolver: Resolver) -> Result<T> {
    let deps = T::dependencies();

    #[cfg(feature = "logging")]
    trace!(
        target: "bindery",
        construct = std::any::type_name::<T>(),
        dependencies = deps.len(),
        in_flight = resolver.stack().len(),
        "Instantiating"
    );

    let mut entries = Vec::with_capacity(deps.len());
    for dep in deps {
        let injected = if dep.deferred {
            Injected::Deferred(resolver.clone(), dep.key.clone())
        } else {
            Injected::Ready(resolver.resolve_raw(dep.key.clone()).await?)
        };
        entries.push((dep, injected));
    }

    let args = Args::new(std::any::type_name::<T>(), entries);
    T::construct(args)
        .await
        .map_err(|err| ResolveError::production(BindingKey::of::<T>(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::deferred;
    use crate::Registry;

    #[derive(Debug)]
    struct Fuel {
        octane: u8,
    }

    #[derive(Debug)]
    struct Engine {
        fuel: Arc<Fuel>,
        spark: Deferred<u32>,
    }

    #[async_trait]
    impl Construct for Engine {
        fn dependencies() -> Vec<InjectKey> {
            vec![InjectKey::of::<Fuel>(), deferred("spark")]
        }

        async fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
            Ok(Self {
                fuel: args.take::<Fuel>()?,
                spark: args.take_deferred::<u32>()?,
            })
        }
    }

    #[tokio::test]
    async fn test_instantiate_wires_dependencies() {
        let registry = Registry::new();
        registry.use_value(Fuel { octane: 95 });
        registry.use_named("spark", 3u32);

        let engine = registry.inject::<Engine>().await.unwrap();
        assert_eq!(engine.fuel.octane, 95);
        assert_eq!(*engine.spark.get().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_dependency_fails_before_construction() {
        let registry = Registry::new();
        // Fuel is not bound; spark alone is not enough.
        registry.use_named("spark", 3u32);

        let err = registry.inject::<Engine>().await.unwrap_err();
        assert!(matches!(err, ResolveError::Unresolved { .. }));
        assert!(err.to_string().contains("Fuel"));
    }

    #[derive(Debug)]
    struct Greedy;

    #[async_trait]
    impl Construct for Greedy {
        async fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
            let _ = args.take::<u32>()?;
            Ok(Self)
        }
    }

    #[tokio::test]
    async fn test_over_consuming_constructor_errors() {
        let registry = Registry::new();
        let err = registry.inject::<Greedy>().await.unwrap_err();

        assert!(matches!(err, ResolveError::Production { .. }));
        assert!(err.to_string().contains("more arguments"));
    }

    #[derive(Debug)]
    struct Impatient;

    #[async_trait]
    impl Construct for Impatient {
        fn dependencies() -> Vec<InjectKey> {
            vec![deferred("spark")]
        }

        async fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
            // Declared deferred but taken eagerly.
            let _ = args.take::<u32>()?;
            Ok(Self)
        }
    }

    #[tokio::test]
    async fn test_deferred_taken_eagerly_errors() {
        let registry = Registry::new();
        registry.use_named("spark", 3u32);

        let err = registry.inject::<Impatient>().await.unwrap_err();
        assert!(err.to_string().contains("declared deferred"));
    }

    #[derive(Debug)]
    struct WrongType;

    #[async_trait]
    impl Construct for WrongType {
        fn dependencies() -> Vec<InjectKey> {
            vec![InjectKey::named("spark")]
        }

        async fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
            let _ = args.take::<String>()?;
            Ok(Self)
        }
    }

    #[tokio::test]
    async fn test_positional_type_mismatch_errors() {
        let registry = Registry::new();
        registry.use_named("spark", 3u32);

        let err = registry.inject::<WrongType>().await.unwrap_err();
        assert!(err.to_string().contains("is not a"));
    }
}
