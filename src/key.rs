//! Binding keys
//!
//! A binding is addressed either by a type's identity or by a string name.
//! Type identity comparison uses `TypeId`, so two otherwise-unrelated types
//! never collide even if their names do.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Identity of a binding within a registry.
///
/// Either the identity of a Rust type (`BindingKey::of::<T>()`) or a string
/// name (`BindingKey::named("database")` or any `&str`/`String` via `From`).
///
/// The `Display` form is part of the error-message contract: type keys print
/// as the bare type name, name keys print double-quoted.
///
/// # Examples
///
/// ```rust
/// use bindery::BindingKey;
///
/// struct Database;
///
/// let by_type = BindingKey::of::<Database>();
/// let by_name = BindingKey::named("database");
///
/// assert_ne!(by_type, by_name);
/// assert_eq!(by_name.to_string(), "\"database\"");
/// ```
#[derive(Clone, Debug)]
pub enum BindingKey {
    /// A type identity key. The name rides along for diagnostics only.
    Type {
        /// Identity of the keying type
        id: TypeId,
        /// `std::any::type_name` of the keying type
        name: &'static str,
    },
    /// A string name key.
    Name(Arc<str>),
}

impl BindingKey {
    /// Key for the identity of type `T`.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key for a string name.
    #[inline]
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::Name(name.into())
    }

    /// Whether this key is a type identity (as opposed to a string name).
    #[inline]
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type { .. })
    }
}

// Equality and hashing go through the identity, not the diagnostic name.
impl PartialEq for BindingKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Type { id: a, .. }, Self::Type { id: b, .. }) => a == b,
            (Self::Name(a), Self::Name(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for BindingKey {}

impl std::hash::Hash for BindingKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::Type { id, .. } => {
                0u8.hash(state);
                id.hash(state);
            }
            Self::Name(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name, .. } => f.write_str(name),
            Self::Name(name) => write!(f, "\"{name}\""),
        }
    }
}

impl From<&str> for BindingKey {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for BindingKey {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<Arc<str>> for BindingKey {
    fn from(name: Arc<str>) -> Self {
        Self::Name(name)
    }
}

/// One entry of a declared dependency list: a binding key, optionally marked
/// deferred.
///
/// A plain entry is resolved before the target's constructor runs. A deferred
/// entry is handed to the constructor as a pending [`Deferred`] handle
/// instead, so construction does not block on its availability.
///
/// [`Deferred`]: crate::Deferred
///
/// # Examples
///
/// ```rust
/// use bindery::{deferred, InjectKey};
///
/// struct Engine;
///
/// let deps = vec![
///     InjectKey::of::<Engine>(),
///     deferred("spark-plug"),
///     InjectKey::of::<Engine>().deferred(),
/// ];
/// assert!(!deps[0].is_deferred());
/// assert!(deps[1].is_deferred());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectKey {
    pub(crate) key: BindingKey,
    pub(crate) deferred: bool,
}

impl InjectKey {
    /// Plain (eagerly resolved) dependency on the type key of `T`.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Self {
            key: BindingKey::of::<T>(),
            deferred: false,
        }
    }

    /// Plain dependency on a name key.
    #[inline]
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            key: BindingKey::named(name),
            deferred: false,
        }
    }

    /// Mark this dependency as deferred.
    #[inline]
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// The underlying binding key.
    #[inline]
    pub fn key(&self) -> &BindingKey {
        &self.key
    }

    /// Whether this dependency is resolved lazily.
    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }
}

impl From<BindingKey> for InjectKey {
    fn from(key: BindingKey) -> Self {
        Self {
            key,
            deferred: false,
        }
    }
}

impl From<&str> for InjectKey {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for InjectKey {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

/// Mark a dependency key as "resolve lazily".
///
/// The target's constructor receives a pending-value handle for this key
/// rather than a resolved value. Recognized only inside a dependency
/// declaration.
#[inline]
pub fn deferred(key: impl Into<BindingKey>) -> InjectKey {
    InjectKey {
        key: key.into(),
        deferred: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;
    struct Gadget;

    #[test]
    fn test_type_keys_compare_by_identity() {
        assert_eq!(BindingKey::of::<Widget>(), BindingKey::of::<Widget>());
        assert_ne!(BindingKey::of::<Widget>(), BindingKey::of::<Gadget>());
    }

    #[test]
    fn test_name_keys_compare_by_content() {
        assert_eq!(BindingKey::named("db"), BindingKey::from("db"));
        assert_ne!(BindingKey::named("db"), BindingKey::named("cache"));
    }

    #[test]
    fn test_type_key_never_equals_name_key() {
        // A type named exactly like a string key is still a different key.
        let type_key = BindingKey::of::<Widget>();
        let name_key = BindingKey::named(std::any::type_name::<Widget>());
        assert_ne!(type_key, name_key);
    }

    #[test]
    fn test_display_forms() {
        let type_key = BindingKey::of::<Widget>();
        assert!(type_key.to_string().ends_with("Widget"));

        let name_key = BindingKey::named("db");
        assert_eq!(name_key.to_string(), "\"db\"");
    }

    #[test]
    fn test_deferred_marker() {
        assert!(!InjectKey::of::<Widget>().is_deferred());
        assert!(InjectKey::of::<Widget>().deferred().is_deferred());
        assert!(deferred("db").is_deferred());
        assert_eq!(deferred("db").key(), &BindingKey::named("db"));
    }

    #[test]
    fn test_hash_distinguishes_kinds() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(BindingKey::of::<Widget>());
        set.insert(BindingKey::named("db"));
        set.insert(BindingKey::named("db"));
        assert_eq!(set.len(), 2);
    }
}
