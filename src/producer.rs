//! Producers: the logic that yields a binding's value on demand
//!
//! The two producer shapes are stored as one tagged enum and dispatched
//! explicitly by the resolver. Pre-resolved (`use`) entries are not
//! producers at all; they go straight into the memo cache.

use crate::error::{BoxError, ResolveError, Result};
use crate::inject::{instantiate, Construct};
use crate::key::BindingKey;
use crate::resolver::Resolver;
use crate::storage::Value;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Type-erased producer body. Building the future is synchronous and
/// effect-free; the producer's work runs only when the future is polled.
type ProduceFn = Box<dyn Fn(Resolver) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A registered producer for one binding key.
pub(crate) enum Producer {
    /// Constructs an instance of a `Construct` type, resolving its declared
    /// dependency list first.
    Constructed { produce: ProduceFn },
    /// Invokes a user-supplied factory with the restricted resolution
    /// surface scoped to the in-flight call stack.
    Factory { produce: ProduceFn },
}

impl Producer {
    /// Producer that builds `T` through its declared dependencies.
    pub(crate) fn constructed<T: Construct>() -> Self {
        let produce: ProduceFn = Box::new(|resolver: Resolver| {
            async move {
                let instance = instantiate::<T>(resolver).await?;
                Ok(Arc::new(instance) as Value)
            }
            .boxed()
        });
        Self::Constructed { produce }
    }

    /// Producer that defers to a user factory. `key` is kept for failure
    /// diagnostics.
    pub(crate) fn factory<T, F, Fut>(key: BindingKey, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let produce: ProduceFn = Box::new(move |resolver: Resolver| {
            let fut = factory(resolver);
            let key = key.clone();
            async move {
                match fut.await {
                    Ok(value) => Ok(Arc::new(value) as Value),
                    Err(err) => Err(ResolveError::production(key, err)),
                }
            }
            .boxed()
        });
        Self::Factory { produce }
    }

    /// Build the production future against `resolver`. Does not run any
    /// producer code; the caller decides when (and whether) to poll.
    pub(crate) fn produce(&self, resolver: Resolver) -> BoxFuture<'static, Result<Value>> {
        match self {
            Self::Constructed { produce } | Self::Factory { produce } => produce(resolver),
        }
    }

    /// Producer shape, for diagnostics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Constructed { .. } => "constructed",
            Self::Factory { .. } => "factory",
        }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").field("kind", &self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Registry;

    #[test]
    fn test_kind_tags() {
        let factory = Producer::factory::<u32, _, _>(BindingKey::named("n"), |_| async { Ok(1) });
        assert_eq!(factory.kind(), "factory");
        assert_eq!(format!("{factory:?}"), "Producer { kind: \"factory\" }");
    }

    #[tokio::test]
    async fn test_factory_produce_yields_erased_value() {
        let registry = Registry::new();
        let producer =
            Producer::factory::<u32, _, _>(BindingKey::named("n"), |_| async { Ok(41 + 1) });

        let value = producer.produce(registry.root_resolver()).await.unwrap();
        let n = value.downcast::<u32>().unwrap();
        assert_eq!(*n, 42);
    }

    #[tokio::test]
    async fn test_factory_failure_carries_the_key() {
        let registry = Registry::new();
        let producer = Producer::factory::<u32, _, _>(BindingKey::named("n"), |_| async {
            Err("out of numbers".into())
        });

        let err = producer.produce(registry.root_resolver()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Production { .. }));
        assert!(err.to_string().contains("\"n\""));
        assert!(err.to_string().contains("out of numbers"));
    }
}
