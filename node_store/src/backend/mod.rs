//! Concurrent containers backing a node store.
//!
//! A backend hands out empty [`NodeMap`]s. Every map guarantees that
//! [`NodeMap::compute`] and [`NodeMap::get_or_insert_with`] run atomically
//! with respect to all other operations on the same identifier, while
//! operations on other identifiers may proceed in parallel.

mod sharded;
mod striped;

pub use sharded::{ShardedBackend, ShardedNodeMap};
pub use striped::{StripedBackend, StripedNodeMap};

use tracing::debug;

use crate::config::{BackendKind, StoreConfig};
use crate::Id;
use crate::Result;

/// Trait for a concurrent identifier-to-node map.
///
/// Closures passed to `compute` and `get_or_insert_with` are executed while
/// the key is locked. They must not call back into the same map.
pub trait NodeMap<N>: Send + Sync {
    /// Get a clone of the node stored for `id`.
    fn get(&self, id: Id) -> Option<N>;

    /// Get the node stored for `id`, creating it with `create` if absent.
    ///
    /// `create` runs at most once per absent key, no matter how many callers
    /// race on it; all of them receive the node that was installed.
    fn get_or_insert_with(&self, id: Id, create: &mut dyn FnMut() -> N) -> N;

    /// Atomically recompute the entry for `id`.
    ///
    /// `remap` receives the current node (if any). Returning `Some` installs
    /// the returned node, returning `None` leaves the key absent.
    fn compute(&self, id: Id, remap: &mut dyn FnMut(Option<&N>) -> Option<N>);

    /// Remove and return the node stored for `id`.
    fn remove(&self, id: Id) -> Option<N>;

    /// Check whether a node exists for `id`.
    fn contains(&self, id: Id) -> bool;

    /// Visit every node currently stored.
    fn for_each_value(&self, visit: &mut dyn FnMut(&N));

    /// Number of stored nodes.
    fn len(&self) -> usize;

    /// Remove every node.
    fn clear(&self);

    /// Check if the map is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time snapshot of all nodes.
    fn values(&self) -> Vec<N>
    where
        N: Clone,
    {
        let mut values = Vec::with_capacity(self.len());
        self.for_each_value(&mut |node| values.push(node.clone()));
        values
    }
}

/// Trait for a supplier of fresh, empty node maps.
pub trait StorageBackend {
    /// Create a new empty map.
    fn new_map<N>(&self) -> Box<dyn NodeMap<N>>
    where
        N: Clone + Send + Sync + 'static;
}

/// A backend selected at runtime from a [`StoreConfig`].
#[derive(Debug, Clone)]
pub enum Backend {
    Sharded(ShardedBackend),
    Striped(StripedBackend),
}

impl Backend {
    /// Build the backend described by `config`.
    ///
    /// The configuration is validated first.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let shards = config.resolved_shards();
        debug!(
            backend = ?config.backend,
            capacity = config.initial_capacity,
            shards,
            "building storage backend"
        );

        let backend = match config.backend {
            BackendKind::Sharded => {
                Backend::Sharded(ShardedBackend::new(config.initial_capacity, shards)?)
            }
            BackendKind::Striped => {
                Backend::Striped(StripedBackend::new(config.initial_capacity, shards)?)
            }
        };

        Ok(backend)
    }

    /// The kind of container this backend produces.
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Sharded(_) => BackendKind::Sharded,
            Backend::Striped(_) => BackendKind::Striped,
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Sharded(ShardedBackend::default())
    }
}

impl StorageBackend for Backend {
    fn new_map<N>(&self) -> Box<dyn NodeMap<N>>
    where
        N: Clone + Send + Sync + 'static,
    {
        match self {
            Backend::Sharded(backend) => backend.new_map(),
            Backend::Striped(backend) => backend.new_map(),
        }
    }
}
