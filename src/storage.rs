//! Per-registry storage: binding map, memo cache, parent pointer
//!
//! Uses `DashMap` with `ahash` for lock-free concurrent access. A registry
//! owns one `BindingStorage`; child registries hold an `Arc` to their
//! parent's storage, never a mutable path into it.

#![allow(dead_code)]

use crate::error::{ResolveError, Result};
use crate::key::BindingKey;
use crate::producer::Producer;
use ahash::RandomState;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use std::any::Any;
use std::sync::Arc;

/// A resolved binding value, type-erased.
pub(crate) type Value = Arc<dyn Any + Send + Sync>;

/// A memoized resolution: a cloneable handle to an in-flight or settled
/// production. Every clone observes the same eventual value or the same
/// rejection, and the underlying producer body runs at most once.
pub(crate) type ResolveFuture = Shared<BoxFuture<'static, Result<Value>>>;

/// Downcast a [`Value`] to `Arc<T>` without a runtime type check.
///
/// # Safety
///
/// The caller must guarantee the `Arc` was created from a value of type `T`.
///
/// In this crate that holds for type-keyed lookups where the key was built
/// from `T` at the call site: every registration path (`bind`, `create`,
/// `use_value`, `use_future`) stores an `Arc<T>` under `BindingKey::of::<T>()`,
/// and parent delegation preserves the key.
#[inline]
pub(crate) unsafe fn downcast_unchecked<T: Send + Sync + 'static>(value: Value) -> Arc<T> {
    let ptr = Arc::into_raw(value);
    // SAFETY: ptr came from Arc::into_raw and the caller guarantees the
    // allocation holds a T.
    unsafe { Arc::from_raw(ptr as *const T) }
}

/// Downcast a [`Value`] to `Arc<T>`, failing with a `TypeMismatch` that names
/// the key. Used wherever the requested type is not pinned by the key itself
/// (name keys, positional constructor arguments, deferred handles).
#[inline]
pub(crate) fn downcast_checked<T: Send + Sync + 'static>(
    key: &BindingKey,
    value: Value,
) -> Result<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| ResolveError::TypeMismatch {
            key: key.clone(),
            expected: std::any::type_name::<T>(),
        })
}

/// Storage for one registry: producers, memoized resolutions, parent link.
pub(crate) struct BindingStorage {
    /// Key to producer. Pre-resolved entries never appear here.
    bindings: DashMap<BindingKey, Producer, RandomState>,
    /// Key to in-flight or settled resolution.
    memo: DashMap<BindingKey, ResolveFuture, RandomState>,
    /// Parent storage, set at child construction and never reassigned.
    parent: Option<Arc<BindingStorage>>,
    /// Nesting depth, 0 for a root. Diagnostics only.
    depth: u32,
}

// 8 shards balances creation cost against concurrent access for the map
// sizes a registry typically holds.
const SHARDS: usize = 8;

fn new_map<V>() -> DashMap<BindingKey, V, RandomState> {
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), SHARDS)
}

impl BindingStorage {
    /// Create root storage with no parent.
    pub(crate) fn new() -> Self {
        Self {
            bindings: new_map(),
            memo: new_map(),
            parent: None,
            depth: 0,
        }
    }

    /// Create child storage chained to this one.
    pub(crate) fn child(self: &Arc<Self>) -> Self {
        Self {
            bindings: new_map(),
            memo: new_map(),
            parent: Some(Arc::clone(self)),
            depth: self.depth + 1,
        }
    }

    /// Register a producer for a key, replacing any existing binding.
    pub(crate) fn insert_binding(&self, key: BindingKey, producer: Producer) {
        self.bindings.insert(key, producer);
    }

    /// Write a resolution into the memo cache directly, replacing any
    /// existing entry. This is how pre-resolved (`use`) entries are stored.
    pub(crate) fn memoize(&self, key: BindingKey, resolution: ResolveFuture) {
        self.memo.insert(key, resolution);
    }

    /// Look up a memoized resolution.
    #[inline]
    pub(crate) fn memo_get(&self, key: &BindingKey) -> Option<ResolveFuture> {
        self.memo.get(key).map(|entry| entry.clone())
    }

    /// Insert `candidate` for `key` unless another resolution got there
    /// first; returns whichever entry won. A losing candidate is dropped
    /// unpolled, so its producer body never runs.
    pub(crate) fn memo_insert_if_absent(
        &self,
        key: BindingKey,
        candidate: ResolveFuture,
    ) -> ResolveFuture {
        use dashmap::mapref::entry::Entry;

        match self.memo.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                entry.insert(candidate.clone());
                candidate
            }
        }
    }

    /// Invoke the local producer for `key`, if one is registered, against
    /// `resolver`. The returned future has not started running.
    pub(crate) fn produce_local(
        &self,
        key: &BindingKey,
        resolver: crate::resolver::Resolver,
    ) -> Option<(BoxFuture<'static, Result<Value>>, &'static str)> {
        self.bindings
            .get(key)
            .map(|binding| (binding.produce(resolver), binding.kind()))
    }

    pub(crate) fn has_binding(&self, key: &BindingKey) -> bool {
        self.bindings.contains_key(key)
    }

    pub(crate) fn has_memo(&self, key: &BindingKey) -> bool {
        self.memo.contains_key(key)
    }

    /// A key is locally bound if it has a producer or a pre-resolved entry.
    pub(crate) fn contains_local(&self, key: &BindingKey) -> bool {
        self.has_binding(key) || self.has_memo(key)
    }

    /// Check this storage and the full parent chain.
    pub(crate) fn contains_in_chain(&self, key: &BindingKey) -> bool {
        if self.contains_local(key) {
            return true;
        }

        let mut current = self.parent.as_ref();
        while let Some(storage) = current {
            if storage.contains_local(key) {
                return true;
            }
            current = storage.parent.as_ref();
        }

        false
    }

    #[inline]
    pub(crate) fn parent(&self) -> Option<&Arc<BindingStorage>> {
        self.parent.as_ref()
    }

    #[inline]
    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of locally bound keys (producers plus pre-resolved entries,
    /// each key counted once). Parents not included.
    pub(crate) fn len(&self) -> usize {
        let memo_only = self
            .memo
            .iter()
            .filter(|entry| !self.bindings.contains_key(entry.key()))
            .count();
        self.bindings.len() + memo_only
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.memo.is_empty()
    }
}

impl std::fmt::Debug for BindingStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingStorage")
            .field("bindings", &self.bindings.len())
            .field("memoized", &self.memo.len())
            .field("depth", &self.depth)
            .finish()
    }
}
