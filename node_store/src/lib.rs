//! # Node Store
//!
//! `node_store` provides a concurrency-safe, identifier-keyed store for live
//! entities. Every identifier maps to a *node*: a caller-defined value that
//! wraps zero-or-one entity and may carry extra relational state (backlinks,
//! membership lists, ...) that outlives individual entity updates.
//!
//! Key concepts:
//!
//! 1. **Node**: the value held by the backing container. A node may exist
//!    without any entity data (a *placeholder*), reserving an identifier that
//!    is referenced before its entity arrives.
//!
//! 2. **Strategies**: four closures fixed at construction that translate
//!    between entities and nodes (`id_getter`, `wrap`, `unwrap`, `rewrap`).
//!
//! 3. **Per-key atomicity**: for one identifier, reading the current node,
//!    computing its replacement and installing it happens as a single step.
//!    Different identifiers never wait on a store-wide lock.
//!
//! 4. **Backends**: the concurrent container is supplied by a
//!    [`StorageBackend`]. [`ShardedBackend`] uses `DashMap`, [`StripedBackend`]
//!    uses lock-striped hash maps. [`Backend`] picks one from a
//!    [`StoreConfig`].
//!
//! ```
//! use node_store::{NodeStore, ShardedBackend};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let store: NodeStore<Option<User>, User> = NodeStore::new(
//!     &ShardedBackend::default(),
//!     |user: &User| user.id,
//!     |user: Option<User>| user,
//!     |node: &Option<User>| node.clone(),
//!     |_: &Option<User>, user: User| Some(user),
//! );
//!
//! store.insert(User { id: 5, name: "a".into() });
//! let previous = store.update(5, |_| Some(User { id: 5, name: "b".into() }));
//! assert_eq!(previous.map(|u| u.name), Some("a".to_string()));
//! assert_eq!(store.find(5).map(|u| u.name), Some("b".to_string()));
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod store;

// Re-export key types for convenience
pub use backend::{Backend, NodeMap, ShardedBackend, StorageBackend, StripedBackend};
pub use config::{BackendKind, StoreConfig};
pub use error::StoreError;
pub use store::NodeStore;

/// Identifier of a stored entity.
pub type Id = u64;

/// A type alias for Result with the store error type
pub type Result<T, E = error::StoreError> = std::result::Result<T, E>;
