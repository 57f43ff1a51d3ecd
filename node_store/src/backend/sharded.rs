//! `DashMap` backed node maps.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{NodeMap, StorageBackend};
use crate::config::default_shards;
use crate::error::StoreError;
use crate::Id;
use crate::Result;

/// Backend producing [`ShardedNodeMap`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardedBackend {
    capacity: usize,
    shards: usize,
}

impl ShardedBackend {
    /// Create a backend whose maps pre-allocate `capacity` entries spread over
    /// `shards` shards.
    ///
    /// `shards` must be a power of two greater than one.
    pub fn new(capacity: usize, shards: usize) -> Result<Self> {
        if shards <= 1 || !shards.is_power_of_two() {
            return Err(StoreError::InvalidConfig(format!(
                "sharded backend needs a power of two greater than 1 shards, got {}",
                shards
            )));
        }

        Ok(Self { capacity, shards })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn shards(&self) -> usize {
        self.shards
    }
}

impl Default for ShardedBackend {
    fn default() -> Self {
        Self {
            capacity: 0,
            shards: default_shards(),
        }
    }
}

impl StorageBackend for ShardedBackend {
    fn new_map<N>(&self) -> Box<dyn NodeMap<N>>
    where
        N: Clone + Send + Sync + 'static,
    {
        Box::new(ShardedNodeMap::new(self.capacity, self.shards))
    }
}

/// A node map over a `DashMap`.
///
/// Per-key atomicity comes from the shard write lock held by the entry API.
pub struct ShardedNodeMap<N> {
    nodes: DashMap<Id, N>,
}

impl<N> ShardedNodeMap<N> {
    fn new(capacity: usize, shards: usize) -> Self {
        Self {
            nodes: DashMap::with_capacity_and_shard_amount(capacity, shards),
        }
    }
}

impl<N> NodeMap<N> for ShardedNodeMap<N>
where
    N: Clone + Send + Sync,
{
    fn get(&self, id: Id) -> Option<N> {
        self.nodes.get(&id).map(|node| node.value().clone())
    }

    fn get_or_insert_with(&self, id: Id, create: &mut dyn FnMut() -> N) -> N {
        self.nodes.entry(id).or_insert_with(create).value().clone()
    }

    fn compute(&self, id: Id, remap: &mut dyn FnMut(Option<&N>) -> Option<N>) {
        match self.nodes.entry(id) {
            Entry::Occupied(mut entry) => match remap(Some(entry.get())) {
                Some(node) => {
                    entry.insert(node);
                }
                None => {
                    entry.remove();
                }
            },
            Entry::Vacant(entry) => {
                if let Some(node) = remap(None) {
                    entry.insert(node);
                }
            }
        }
    }

    fn remove(&self, id: Id) -> Option<N> {
        self.nodes.remove(&id).map(|(_, node)| node)
    }

    fn contains(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }

    fn for_each_value(&self, visit: &mut dyn FnMut(&N)) {
        for entry in self.nodes.iter() {
            visit(entry.value());
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn clear(&self) {
        self.nodes.clear();
    }
}
