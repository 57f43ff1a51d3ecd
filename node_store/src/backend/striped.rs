//! Lock-striped node maps.
//!
//! Identifiers are spread over a fixed number of `RwLock<HashMap>` stripes.
//! A key is only ever stored in its own stripe, so holding that stripe's write
//! lock makes a read-compute-install sequence atomic for the key while other
//! stripes stay available.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{NodeMap, StorageBackend};
use crate::config::default_shards;
use crate::error::StoreError;
use crate::Id;
use crate::Result;

// Fibonacci hashing multiplier (2^64 / golden ratio).
const STRIPE_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Backend producing [`StripedNodeMap`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripedBackend {
    capacity: usize,
    stripes: usize,
}

impl StripedBackend {
    /// Create a backend whose maps pre-allocate `capacity` entries spread over
    /// `stripes` independently locked stripes.
    pub fn new(capacity: usize, stripes: usize) -> Result<Self> {
        if stripes == 0 {
            return Err(StoreError::InvalidConfig(
                "striped backend needs at least one stripe".to_string(),
            ));
        }

        Ok(Self { capacity, stripes })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stripes(&self) -> usize {
        self.stripes
    }
}

impl Default for StripedBackend {
    fn default() -> Self {
        Self {
            capacity: 0,
            stripes: default_shards(),
        }
    }
}

impl StorageBackend for StripedBackend {
    fn new_map<N>(&self) -> Box<dyn NodeMap<N>>
    where
        N: Clone + Send + Sync + 'static,
    {
        Box::new(StripedNodeMap::new(self.capacity, self.stripes))
    }
}

/// A node map split into independently locked stripes.
pub struct StripedNodeMap<N> {
    stripes: Box<[RwLock<HashMap<Id, N>>]>,
}

impl<N> StripedNodeMap<N> {
    fn new(capacity: usize, stripes: usize) -> Self {
        let per_stripe = capacity.div_ceil(stripes);
        Self {
            stripes: (0..stripes)
                .map(|_| RwLock::new(HashMap::with_capacity(per_stripe)))
                .collect(),
        }
    }

    fn stripe(&self, id: Id) -> &RwLock<HashMap<Id, N>> {
        let mixed = id.wrapping_mul(STRIPE_MIX) >> 32;
        &self.stripes[(mixed % self.stripes.len() as u64) as usize]
    }
}

impl<N> NodeMap<N> for StripedNodeMap<N>
where
    N: Clone + Send + Sync,
{
    fn get(&self, id: Id) -> Option<N> {
        self.stripe(id).read().get(&id).cloned()
    }

    fn get_or_insert_with(&self, id: Id, create: &mut dyn FnMut() -> N) -> N {
        if let Some(node) = self.stripe(id).read().get(&id) {
            return node.clone();
        }

        // Re-check under the write lock; another caller may have won the race
        let mut stripe = self.stripe(id).write();
        stripe.entry(id).or_insert_with(create).clone()
    }

    fn compute(&self, id: Id, remap: &mut dyn FnMut(Option<&N>) -> Option<N>) {
        let mut stripe = self.stripe(id).write();
        match remap(stripe.get(&id)) {
            Some(node) => {
                stripe.insert(id, node);
            }
            None => {
                stripe.remove(&id);
            }
        }
    }

    fn remove(&self, id: Id) -> Option<N> {
        self.stripe(id).write().remove(&id)
    }

    fn contains(&self, id: Id) -> bool {
        self.stripe(id).read().contains_key(&id)
    }

    fn for_each_value(&self, visit: &mut dyn FnMut(&N)) {
        for stripe in self.stripes.iter() {
            for node in stripe.read().values() {
                visit(node);
            }
        }
    }

    fn len(&self) -> usize {
        self.stripes.iter().map(|stripe| stripe.read().len()).sum()
    }

    fn clear(&self) {
        for stripe in self.stripes.iter() {
            stripe.write().clear();
        }
    }
}
