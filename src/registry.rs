//! The binding registry
//!
//! `Registry` is the full surface: registration (`bind`/`create`/`use_value`
//! families), resolution (`get`/`inject`) and hierarchy (`child`). Producers
//! only ever see the narrowed [`Resolver`] surface.

use crate::error::{BoxError, ResolveError, Result};
use crate::inject::{instantiate, Construct};
use crate::key::BindingKey;
use crate::producer::Producer;
use crate::resolver::{settled, CallStack, Resolver};
use crate::storage::{BindingStorage, ResolveFuture, Value};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// A dependency-injection registry.
///
/// Bindings are declared under a type identity or a string name, resolved
/// lazily, and memoized per registry: a producer runs at most once per key,
/// and every `get` for that key observes the same value. Child registries
/// inherit lookups from their parent and may shadow its bindings without
/// mutating them.
///
/// Cloning a `Registry` yields another handle to the same registry.
///
/// # Examples
///
/// ```rust
/// use bindery::{Registry, Resolver};
///
/// struct Config { debug: bool }
///
/// # async fn demo() -> bindery::Result<()> {
/// let registry = Registry::new();
/// registry
///     .use_value(Config { debug: true })
///     .create_named("banner", |ctx: Resolver| async move {
///         let config = ctx.get::<Config>().await?;
///         Ok(if config.debug { "dev" } else { "prod" })
///     });
///
/// let banner = registry.get_named::<&str>("banner").await?;
/// assert_eq!(*banner, "dev");
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Registry {
    storage: Arc<BindingStorage>,
}

impl Registry {
    /// Create a new root registry.
    pub fn new() -> Self {
        #[cfg(feature = "logging")]
        debug!(target: "bindery", depth = 0, "Creating root registry");

        Self {
            storage: Arc::new(BindingStorage::new()),
        }
    }

    pub(crate) fn from_storage(storage: BindingStorage) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Create a child registry.
    ///
    /// The child starts with empty bindings and memo, inherits lookups from
    /// this registry on a local miss, and may shadow bindings without
    /// affecting this registry.
    pub fn child(&self) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "bindery",
            parent_depth = self.storage.depth(),
            child_depth = self.storage.depth() + 1,
            "Creating child registry"
        );

        Self::from_storage(self.storage.child())
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a constructible binding for `T` under its own type key.
    ///
    /// The producer resolves `T`'s declared dependency list and invokes its
    /// constructor on first `get`; nothing runs at registration time.
    pub fn bind<T: Construct>(&self) -> &Self {
        self.register(BindingKey::of::<T>(), Producer::constructed::<T>())
    }

    /// Register a constructible binding for `T` under a name key.
    pub fn bind_named<T: Construct>(&self, name: &str) -> &Self {
        self.register(BindingKey::named(name), Producer::constructed::<T>())
    }

    /// Register a factory binding under the type key of `T`.
    ///
    /// The factory receives a [`Resolver`] scoped to the call stack active
    /// when the producer is invoked; it can resolve and inject, but not
    /// register.
    pub fn create<T, F, Fut>(&self, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let key = BindingKey::of::<T>();
        self.register(key.clone(), Producer::factory::<T, _, _>(key, factory))
    }

    /// Register a factory binding under a name key.
    pub fn create_named<T, F, Fut>(&self, name: &str, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let key = BindingKey::named(name);
        self.register(key.clone(), Producer::factory::<T, _, _>(key, factory))
    }

    /// Register an already-resolved value under the type key of `T`.
    ///
    /// The value is written directly into the memo cache; no producer
    /// exists for the key and lookups find it immediately.
    pub fn use_value<T: Send + Sync + 'static>(&self, value: T) -> &Self {
        self.pre_resolve(
            BindingKey::of::<T>(),
            settled(Ok(Arc::new(value) as Value)),
        )
    }

    /// Register an already-resolved value under a name key.
    pub fn use_named<T: Send + Sync + 'static>(&self, name: &str, value: T) -> &Self {
        self.pre_resolve(
            BindingKey::named(name),
            settled(Ok(Arc::new(value) as Value)),
        )
    }

    /// Register a pending value under the type key of `T`.
    ///
    /// The future is normalized into the memo cache: it is driven on first
    /// `get`, shared by all requesters, and a rejection becomes the
    /// memoized rejection for the key.
    pub fn use_future<T, Fut>(&self, fut: Fut) -> &Self
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let key = BindingKey::of::<T>();
        let resolution = Self::normalize(key.clone(), fut);
        self.pre_resolve(key, resolution)
    }

    /// Register a pending value under a name key.
    pub fn use_future_named<T, Fut>(&self, name: &str, fut: Fut) -> &Self
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let key = BindingKey::named(name);
        let resolution = Self::normalize(key.clone(), fut);
        self.pre_resolve(key, resolution)
    }

    fn normalize<T, Fut>(key: BindingKey, fut: Fut) -> ResolveFuture
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        async move {
            match fut.await {
                Ok(value) => Ok(Arc::new(value) as Value),
                Err(err) => Err(ResolveError::production(key, err)),
            }
        }
        .boxed()
        .shared()
    }

    /// Store a producer, replacing any existing binding for the key.
    ///
    /// The memo cache is left alone: a key resolved before rebinding keeps
    /// replaying its memoized value.
    fn register(&self, key: BindingKey, producer: Producer) -> &Self {
        #[cfg(feature = "logging")]
        {
            if self.storage.has_memo(&key) {
                warn!(
                    target: "bindery",
                    key = %key,
                    "Rebinding a key that already has a memoized resolution; existing and future gets keep the memoized value"
                );
            }
            debug!(
                target: "bindery",
                key = %key,
                kind = producer.kind(),
                depth = self.storage.depth(),
                "Registering binding"
            );
        }

        self.storage.insert_binding(key, producer);
        self
    }

    /// Store a pre-resolved entry, replacing any existing memo entry.
    fn pre_resolve(&self, key: BindingKey, resolution: ResolveFuture) -> &Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "bindery",
            key = %key,
            kind = "pre-resolved",
            depth = self.storage.depth(),
            "Registering binding"
        );

        self.storage.memoize(key, resolution);
        self
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve the binding keyed by the type identity of `T`.
    ///
    /// The first call triggers the producer; every later call, and every
    /// concurrent call racing the first, observes the same memoized value.
    pub async fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.root_resolver().get::<T>().await
    }

    /// Resolve the binding keyed by `name`, downcasting to `T`.
    pub async fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.root_resolver().get_named::<T>(name).await
    }

    /// Like [`get`](Self::get), returning `None` on any failure.
    pub async fn try_get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get::<T>().await.ok()
    }

    /// Like [`get_named`](Self::get_named), returning `None` on any failure.
    pub async fn try_get_named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.get_named::<T>(name).await.ok()
    }

    /// Construct a fresh, dependency-wired `T`.
    ///
    /// Not memoized: every call produces a new instance. The bindings its
    /// dependencies resolve through are still memoized as usual.
    pub async fn inject<T: Construct>(&self) -> Result<T> {
        instantiate::<T>(self.root_resolver()).await
    }

    pub(crate) fn root_resolver(&self) -> Resolver {
        Resolver::new(Arc::clone(&self.storage), CallStack::new())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the type key of `T` is bound here or in any ancestor.
    pub fn contains_type<T: 'static>(&self) -> bool {
        self.storage.contains_in_chain(&BindingKey::of::<T>())
    }

    /// Whether `name` is bound here or in any ancestor.
    pub fn contains_named(&self, name: &str) -> bool {
        self.storage.contains_in_chain(&BindingKey::named(name))
    }

    /// Number of keys bound in this registry (not including ancestors).
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether this registry has no local bindings.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Nesting depth, 0 for a root registry.
    pub fn depth(&self) -> u32 {
        self.storage.depth()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("bindings", &self.len())
            .field("depth", &self.depth())
            .field("has_parent", &(self.depth() > 0))
            .finish()
    }
}
