//! # Bindery - Async Dependency-Injection Registry for Rust
//!
//! A small dependency-injection registry: declare producers of values under
//! type or string keys, resolve them lazily, and share the results.
//!
//! ## Features
//!
//! - **Memoized resolution** - a producer runs at most once per key per
//!   registry; every caller, including concurrent ones, observes the same
//!   value
//! - **Async producers** - factories and constructors are futures; in-flight
//!   resolutions are shared, not repeated
//! - **Constructor injection** - types declare an ordered dependency list
//!   and are built positionally
//! - **Deferred dependencies** - a constructor can receive a pending-value
//!   handle instead of blocking on a dependency
//! - **Hierarchical registries** - children inherit lookups from their
//!   parent and shadow bindings without mutating them
//! - **Cycle detection** - a key requested while already in-flight on the
//!   same path rejects instead of deadlocking
//! - **Observable** - optional `tracing` integration with JSON or pretty
//!   output
//!
//! ## Quick Start
//!
//! ```rust
//! use bindery::{async_trait, Args, BoxError, Construct, InjectKey, Registry};
//! use std::sync::Arc;
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Database {
//!     config: Arc<Config>,
//! }
//!
//! #[async_trait]
//! impl Construct for Database {
//!     fn dependencies() -> Vec<InjectKey> {
//!         vec![InjectKey::of::<Config>()]
//!     }
//!
//!     async fn construct(mut args: Args) -> Result<Self, BoxError> {
//!         Ok(Self { config: args.take::<Config>()? })
//!     }
//! }
//!
//! # async fn demo() -> bindery::Result<()> {
//! let registry = Registry::new();
//! registry
//!     .use_value(Config { url: "postgres://localhost".into() })
//!     .bind::<Database>();
//!
//! // First get runs the constructor; later gets share the same instance.
//! let db = registry.get::<Database>().await?;
//! let same = registry.get::<Database>().await?;
//! assert!(Arc::ptr_eq(&db, &same));
//! # Ok(()) }
//! ```
//!
//! ## Binding Shapes
//!
//! ```rust
//! use bindery::{Registry, Resolver};
//!
//! struct ApiKey(String);
//!
//! let registry = Registry::new();
//!
//! // Pre-resolved: stored already settled, no producer involved.
//! registry.use_value(ApiKey("sk-test".into()));
//!
//! // Factory: runs once, on first get, with a restricted resolver surface.
//! registry.create_named("greeting", |ctx: Resolver| async move {
//!     let key = ctx.get::<ApiKey>().await?;
//!     Ok(format!("authorized as {}", key.0))
//! });
//! ```
//!
//! ## Child Registries
//!
//! ```rust
//! use bindery::Registry;
//!
//! # async fn demo() -> bindery::Result<()> {
//! let root = Registry::new();
//! root.use_named("env", String::from("production"));
//!
//! let request = root.child();
//! request.use_named("env", String::from("test"));
//!
//! // The child shadows; the root is untouched.
//! assert_eq!(&*request.get_named::<String>("env").await?, "test");
//! assert_eq!(&*root.get_named::<String>("env").await?, "production");
//! # Ok(()) }
//! ```

mod error;
mod inject;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
mod producer;
mod registry;
mod resolver;
mod storage;

pub use error::{BoxError, ResolveError, Result};
pub use inject::{ArgError, Args, Construct};
pub use key::{deferred, BindingKey, InjectKey};
pub use registry::Registry;
pub use resolver::{Deferred, Resolver};

// Re-export the attribute macro so implementors of `Construct` don't need
// their own async-trait dependency.
pub use async_trait::async_trait;

// Re-export tracing macros for convenience when the logging feature is on
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        async_trait, deferred, Args, BindingKey, BoxError, Construct, Deferred, InjectKey,
        Registry, ResolveError, Resolver, Result,
    };
    pub use std::sync::Arc;
}
