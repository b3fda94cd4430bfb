//! The memoized resolver
//!
//! Turns a binding key into a shared resolution future, handling cycle
//! detection and parent delegation. Also defines the restricted capability
//! surface handed to factories ([`Resolver`]) and the pending-value handle
//! for deferred dependencies ([`Deferred`]).

use crate::error::{ResolveError, Result};
use crate::inject::{instantiate, Construct};
use crate::key::BindingKey;
use crate::registry::Registry;
use crate::storage::{downcast_checked, downcast_unchecked, BindingStorage, ResolveFuture, Value};
use futures::future;
use futures::FutureExt;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// The ordered sequence of keys currently being resolved on one call path
/// within one registry. Pushing allocates a fresh stack; nothing is shared
/// mutably between call paths, and a parent delegation always starts from an
/// empty stack.
#[derive(Clone, Debug, Default)]
pub(crate) struct CallStack {
    keys: Vec<BindingKey>,
}

impl CallStack {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn contains(&self, key: &BindingKey) -> bool {
        self.keys.contains(key)
    }

    #[inline]
    pub(crate) fn push(&self, key: &BindingKey) -> Self {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.extend(self.keys.iter().cloned());
        keys.push(key.clone());
        Self { keys }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

/// An already-settled resolution future.
pub(crate) fn settled(result: Result<Value>) -> ResolveFuture {
    future::ready(result).boxed().shared()
}

/// Resolve `key` against `storage` under the in-flight `stack`.
///
/// The five steps, in order:
///
/// 1. `key` already on the stack means a cycle on this registry. Delegate to
///    the parent with a fresh empty stack if there is one (a child
///    mid-resolution for a key may still legitimately obtain that key from
///    an ancestor), otherwise fail with a cycle error.
/// 2. A memo entry, pending or settled, is returned unchanged. This is the
///    single-producer-invocation guarantee. The cycle check must come first:
///    an in-flight key always has a memo entry, and handing it to a cyclic
///    request would await itself forever.
/// 3. A local producer is invoked with `stack + [key]` and the resulting
///    future is stored in the memo cache before any of the producer's work
///    can run, so concurrent requesters observe the in-flight future rather
///    than triggering a second invocation.
/// 4. Otherwise delegate to the parent with a fresh empty stack.
/// 5. Otherwise fail with an unresolved-binding error.
pub(crate) fn resolve_key(
    storage: &Arc<BindingStorage>,
    key: BindingKey,
    stack: &CallStack,
) -> ResolveFuture {
    if stack.contains(&key) {
        if let Some(parent) = storage.parent() {
            #[cfg(feature = "logging")]
            trace!(
                target: "bindery",
                key = %key,
                depth = storage.depth(),
                "Cycle on current registry, retrying from parent with fresh stack"
            );
            return resolve_key(parent, key, &CallStack::new());
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "bindery",
            key = %key,
            in_flight = stack.len(),
            "Cycle detected with no parent to break it"
        );
        return settled(Err(ResolveError::Cycle { key }));
    }

    if let Some(memoized) = storage.memo_get(&key) {
        #[cfg(feature = "logging")]
        trace!(
            target: "bindery",
            key = %key,
            depth = storage.depth(),
            "Returning memoized resolution"
        );
        return memoized;
    }

    let scoped = Resolver::new(Arc::clone(storage), stack.push(&key));
    if let Some((produced, _kind)) = storage.produce_local(&key, scoped) {
        #[cfg(feature = "logging")]
        trace!(
            target: "bindery",
            key = %key,
            kind = _kind,
            depth = storage.depth(),
            "Invoking producer"
        );
        return storage.memo_insert_if_absent(key, produced.shared());
    }

    if let Some(parent) = storage.parent() {
        #[cfg(feature = "logging")]
        trace!(
            target: "bindery",
            key = %key,
            depth = storage.depth(),
            "Not bound locally, delegating to parent"
        );
        return resolve_key(parent, key, &CallStack::new());
    }

    #[cfg(feature = "logging")]
    debug!(
        target: "bindery",
        key = %key,
        "No binding found in registry or ancestors"
    );
    settled(Err(ResolveError::Unresolved { key }))
}

/// Restricted resolution surface handed to factories and available to
/// producers.
///
/// Exposes only `get`/`inject`/child creation, scoped to the call stack that
/// was active when the producer was invoked. Registration operations are not
/// reachable from here, so a producer cannot mutate the registry that is
/// resolving it.
///
/// # Examples
///
/// ```rust
/// use bindery::{Registry, Resolver};
///
/// struct Config { url: String }
/// struct Database { url: String }
///
/// # fn main() {
/// let registry = Registry::new();
/// registry.use_value(Config { url: "postgres://localhost".into() });
/// registry.create(|ctx: Resolver| async move {
///     let config = ctx.get::<Config>().await?;
///     Ok(Database { url: config.url.clone() })
/// });
/// # }
/// ```
#[derive(Clone)]
pub struct Resolver {
    storage: Arc<BindingStorage>,
    stack: CallStack,
}

impl Resolver {
    pub(crate) fn new(storage: Arc<BindingStorage>, stack: CallStack) -> Self {
        Self { storage, stack }
    }

    /// Resolve the raw erased value for `key` under this surface's stack.
    pub(crate) async fn resolve_raw(&self, key: BindingKey) -> Result<Value> {
        resolve_key(&self.storage, key, &self.stack).await
    }

    /// Resolve the binding keyed by the type identity of `T`.
    pub async fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let value = self.resolve_raw(BindingKey::of::<T>()).await?;
        // SAFETY: type-keyed registrations always store an Arc<T> under the
        // type key of T, and delegation preserves the key.
        Ok(unsafe { downcast_unchecked(value) })
    }

    /// Resolve the binding keyed by `name`, downcasting to `T`.
    pub async fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let key = BindingKey::named(name);
        let value = self.resolve_raw(key.clone()).await?;
        downcast_checked(&key, value)
    }

    /// Like [`get`](Self::get), returning `None` on any failure.
    pub async fn try_get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get::<T>().await.ok()
    }

    /// Construct a fresh, dependency-wired `T`. Not memoized; nested
    /// resolutions participate in this surface's call stack.
    pub async fn inject<T: Construct>(&self) -> Result<T> {
        instantiate::<T>(self.clone()).await
    }

    /// Create a child registry of the registry this surface belongs to.
    pub fn child(&self) -> Registry {
        Registry::from_storage(self.storage.child())
    }

    #[cfg_attr(not(feature = "logging"), allow(dead_code))]
    pub(crate) fn stack(&self) -> &CallStack {
        &self.stack
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("depth", &self.storage.depth())
            .field("in_flight", &self.stack.len())
            .finish()
    }
}

/// Pending-value handle for a deferred dependency.
///
/// Created synchronously during injection without resolving anything.
/// Awaiting it through [`get`](Self::get) triggers, or reuses, the
/// resolution of the underlying key with the call-stack context captured
/// when the handle was made, so it participates in the same cycle and
/// parent-delegation rules as the original injection.
pub struct Deferred<T> {
    resolver: Resolver,
    key: BindingKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Deferred<T> {
    pub(crate) fn new(resolver: Resolver, key: BindingKey) -> Self {
        Self {
            resolver,
            key,
            _marker: PhantomData,
        }
    }

    /// The key this handle will resolve.
    pub fn key(&self) -> &BindingKey {
        &self.key
    }
}

impl<T: Send + Sync + 'static> Deferred<T> {
    /// Resolve the underlying key now, or reuse its memoized resolution.
    pub async fn get(&self) -> Result<Arc<T>> {
        let value = self.resolver.resolve_raw(self.key.clone()).await?;
        downcast_checked(&self.key, value)
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Registry;

    #[test]
    fn test_stack_push_is_fresh_allocation() {
        let empty = CallStack::new();
        let key = BindingKey::named("a");

        let one = empty.push(&key);
        assert!(one.contains(&key));
        assert!(!empty.contains(&key));
        assert_eq!(empty.len(), 0);
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_key_rejects() {
        let registry = Registry::new();
        let err = registry
            .root_resolver()
            .resolve_raw(BindingKey::named("ghost"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Unresolved { .. }));
        assert!(err.to_string().contains("\"ghost\""));
    }

    #[tokio::test]
    async fn test_cycle_without_parent_rejects() {
        let registry = Registry::new();
        registry.create_named("foo", |ctx: Resolver| async move {
            let n = ctx.get_named::<u32>("foo").await?;
            Ok(*n)
        });

        let err = registry.get_named::<u32>("foo").await.unwrap_err();
        assert!(matches!(err, ResolveError::Cycle { .. }));
        assert!(err.to_string().contains("\"foo\""));
    }

    #[tokio::test]
    async fn test_cycle_falls_through_to_parent_binding() {
        let parent = Registry::new();
        parent.use_named("greeting", String::from("hello"));

        // The child shadows "greeting" in terms of itself; the self-lookup
        // restarts from the parent instead of reporting a cycle.
        let child = parent.child();
        child.create_named("greeting", |ctx: Resolver| async move {
            let base = ctx.get_named::<String>("greeting").await?;
            Ok(format!("{base}, world"))
        });

        let greeting = child.get_named::<String>("greeting").await.unwrap();
        assert_eq!(&*greeting, "hello, world");

        // The parent keeps its own value.
        let parent_greeting = parent.get_named::<String>("greeting").await.unwrap();
        assert_eq!(&*parent_greeting, "hello");
    }

    #[tokio::test]
    async fn test_memoized_rejection_replays() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let attempts = Arc::new(AtomicU32::new(0));
        let registry = Registry::new();
        {
            let attempts = Arc::clone(&attempts);
            registry.create_named("flaky", move |_| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>("boom".into())
                }
            });
        }

        let first = registry.get_named::<u32>("flaky").await.unwrap_err();
        let second = registry.get_named::<u32>("flaky").await.unwrap_err();

        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolver_surface_can_spawn_children() {
        let registry = Registry::new();
        registry.use_named("base", 10u32);
        registry.create_named("derived", |ctx: Resolver| async move {
            // A producer may build a private child scope of its own.
            let scratch = ctx.child();
            scratch.use_named("offset", 32u32);
            let base = ctx.get_named::<u32>("base").await?;
            let offset = scratch.get_named::<u32>("offset").await?;
            Ok(*base + *offset)
        });

        let value = registry.get_named::<u32>("derived").await.unwrap();
        assert_eq!(*value, 42);
    }
}
