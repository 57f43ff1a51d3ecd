//! The identifier-keyed node store.
//!
//! A [`NodeStore`] keeps one node per identifier and exposes an entity-level
//! view of it through four strategies supplied at construction:
//!
//! - `id_getter`: derives the identifier of an entity
//! - `wrap`: builds a fresh node around an entity, or an empty node for `None`
//! - `unwrap`: extracts the entity from a node, `None` for an empty node
//! - `rewrap`: merges new entity data into an existing node, keeping any
//!   node-only state
//!
//! Strategies and update functions run while the identifier is locked by the
//! backend. They must be pure and must not panic: a panic propagates to the
//! caller and the entry keeps whatever node it held before the call. Update
//! functions may also be invoked more than once for one logical call by
//! backends that retry optimistically.

use std::fmt;

use tracing::{debug, trace};

use crate::backend::{NodeMap, StorageBackend};
use crate::Id;

type IdGetter<T> = Box<dyn Fn(&T) -> Id + Send + Sync>;
type WrapFn<N, T> = Box<dyn Fn(Option<T>) -> N + Send + Sync>;
type UnwrapFn<N, T> = Box<dyn Fn(&N) -> Option<T> + Send + Sync>;
type RewrapFn<N, T> = Box<dyn Fn(&N, T) -> N + Send + Sync>;

/// What an update did to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Replaced,
    Removed,
    Unchanged,
}

/// Concurrent store mapping identifiers to nodes wrapping zero-or-one entity.
pub struct NodeStore<N, T> {
    nodes: Box<dyn NodeMap<N>>,
    id_getter: IdGetter<T>,
    wrap: WrapFn<N, T>,
    unwrap: UnwrapFn<N, T>,
    rewrap: RewrapFn<N, T>,
}

impl<N, T> NodeStore<N, T>
where
    N: Clone + Send + Sync + 'static,
    T: Clone + 'static,
{
    /// Create an empty store over a fresh map from `backend`.
    pub fn new<B, I, W, U, R>(backend: &B, id_getter: I, wrap: W, unwrap: U, rewrap: R) -> Self
    where
        B: StorageBackend,
        I: Fn(&T) -> Id + Send + Sync + 'static,
        W: Fn(Option<T>) -> N + Send + Sync + 'static,
        U: Fn(&N) -> Option<T> + Send + Sync + 'static,
        R: Fn(&N, T) -> N + Send + Sync + 'static,
    {
        Self {
            nodes: backend.new_map(),
            id_getter: Box::new(id_getter),
            wrap: Box::new(wrap),
            unwrap: Box::new(unwrap),
            rewrap: Box::new(rewrap),
        }
    }

    /// Identifier the store derives for `entity`.
    pub fn id_of(&self, entity: &T) -> Id {
        (self.id_getter)(entity)
    }

    /// Get the node for `id`, atomically creating an empty one if absent.
    ///
    /// Concurrent callers for the same absent identifier all receive the single
    /// node that was created.
    pub fn find_or_create_node(&self, id: Id) -> N {
        let mut created = false;
        let node = self.nodes.get_or_insert_with(id, &mut || {
            created = true;
            (self.wrap)(None)
        });

        if created {
            trace!(id, "created placeholder node");
        }

        node
    }

    /// Get the node for `id` without creating one.
    pub fn find_node(&self, id: Id) -> Option<N> {
        self.nodes.get(id)
    }

    /// Check whether any node, empty or not, exists for `id`.
    pub fn contains_node(&self, id: Id) -> bool {
        self.nodes.contains(id)
    }

    /// Snapshot of every node, placeholders included.
    pub fn nodes(&self) -> Vec<N> {
        self.nodes.values()
    }

    /// Number of nodes, placeholders included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the entity stored for `id`.
    pub fn find(&self, id: Id) -> Option<T> {
        self.nodes.get(id).and_then(|node| (self.unwrap)(&node))
    }

    /// Snapshot of every present entity, in no particular order.
    pub fn find_all(&self) -> Vec<T> {
        let mut entities = Vec::new();
        self.nodes.for_each_value(&mut |node| {
            if let Some(entity) = (self.unwrap)(node) {
                entities.push(entity);
            }
        });
        entities
    }

    /// Number of nodes holding a present entity.
    pub fn count(&self) -> usize {
        let mut count = 0;
        self.nodes.for_each_value(&mut |node| {
            if (self.unwrap)(node).is_some() {
                count += 1;
            }
        });
        count
    }

    /// Install `entity` under its derived identifier, replacing any previous
    /// entity and keeping node-only state.
    pub fn insert(&self, entity: T) {
        let id = self.id_of(&entity);
        self.update(id, |_| Some(entity.clone()));
    }

    /// Atomically replace the entity for `id` with `update(previous)`.
    ///
    /// - No node: a present result is wrapped into a new node.
    /// - Existing node: a present result is merged in with `rewrap`, an absent
    ///   result removes the node entirely.
    ///
    /// Returns the previously unwrapped entity. An empty node and a missing
    /// node both yield `None`.
    pub fn update<F>(&self, id: Id, mut update: F) -> Option<T>
    where
        F: FnMut(Option<&T>) -> Option<T>,
    {
        let mut previous = None;
        let mut outcome = Outcome::Unchanged;

        self.nodes.compute(id, &mut |current| match current {
            None => {
                previous = None;
                let created = update(None).map(|data| (self.wrap)(Some(data)));
                outcome = if created.is_some() {
                    Outcome::Created
                } else {
                    Outcome::Unchanged
                };
                created
            }
            Some(node) => {
                let old = (self.unwrap)(node);
                let new = update(old.as_ref());
                previous = old;
                match new {
                    Some(data) => {
                        outcome = Outcome::Replaced;
                        Some((self.rewrap)(node, data))
                    }
                    None => {
                        outcome = Outcome::Removed;
                        None
                    }
                }
            }
        });

        trace!(id, ?outcome, "updated node");
        previous
    }

    /// Like [`update`](Self::update), but `update` only runs when an entity is
    /// present for `id`.
    ///
    /// Missing and empty nodes are left untouched and yield `None`.
    pub fn update_if_present<F>(&self, id: Id, mut update: F) -> Option<T>
    where
        F: FnMut(&T) -> Option<T>,
    {
        let mut previous = None;
        let mut outcome = Outcome::Unchanged;

        self.nodes.compute(id, &mut |current| {
            previous = None;
            outcome = Outcome::Unchanged;

            let node = current?;
            let Some(old) = (self.unwrap)(node) else {
                return Some(node.clone());
            };

            let new = update(&old);
            previous = Some(old);
            match new {
                Some(data) => {
                    outcome = Outcome::Replaced;
                    Some((self.rewrap)(node, data))
                }
                None => {
                    outcome = Outcome::Removed;
                    None
                }
            }
        });

        trace!(id, ?outcome, "updated node if present");
        previous
    }

    /// Atomically remove the node for `id`, returning its entity.
    pub fn delete(&self, id: Id) -> Option<T> {
        let node = self.nodes.remove(id)?;
        trace!(id, "deleted node");
        (self.unwrap)(&node)
    }

    /// Remove every node.
    pub fn clear(&self) {
        let dropped = self.nodes.len();
        self.nodes.clear();
        debug!(dropped, "cleared node store");
    }
}

impl<N, T> fmt::Debug for NodeStore<N, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStore")
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ShardedBackend, StripedBackend};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    fn user(id: u64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
        }
    }

    /// A user plus the guilds known to reference it.
    #[derive(Debug, Default)]
    struct UserNode {
        user: Option<User>,
        guild_ids: Arc<Mutex<Vec<u64>>>,
    }

    fn user_store<B: StorageBackend>(backend: &B) -> NodeStore<Arc<UserNode>, User> {
        NodeStore::new(
            backend,
            |user: &User| user.id,
            |user: Option<User>| {
                Arc::new(UserNode {
                    user,
                    guild_ids: Arc::default(),
                })
            },
            |node: &Arc<UserNode>| node.user.clone(),
            |node: &Arc<UserNode>, user: User| {
                Arc::new(UserNode {
                    user: Some(user),
                    guild_ids: node.guild_ids.clone(),
                })
            },
        )
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let store = user_store(&ShardedBackend::default());
        let entity = user(1, "a");

        let node = (store.wrap)(Some(entity.clone()));
        assert_eq!((store.unwrap)(&node), Some(entity));

        let empty = (store.wrap)(None);
        assert_eq!((store.unwrap)(&empty), None);
    }

    #[test]
    fn test_insert_then_find() {
        let store = user_store(&ShardedBackend::default());
        store.insert(user(5, "a"));

        assert_eq!(store.find(5), Some(user(5, "a")));
        assert_eq!(store.count(), 1);
        assert_eq!(store.id_of(&user(5, "a")), 5);
    }

    #[test]
    fn test_insert_overwrites() {
        let store = user_store(&ShardedBackend::default());
        store.insert(user(5, "a"));
        store.insert(user(5, "b"));

        assert_eq!(store.find(5), Some(user(5, "b")));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_update_returns_previous() {
        let store = user_store(&ShardedBackend::default());
        store.insert(user(5, "a"));

        let previous = store.update(5, |old| {
            assert_eq!(old, Some(&user(5, "a")));
            Some(user(5, "b"))
        });

        assert_eq!(previous, Some(user(5, "a")));
        assert_eq!(store.find(5), Some(user(5, "b")));
    }

    #[test]
    fn test_update_creates_from_absent() {
        let store = user_store(&ShardedBackend::default());

        let previous = store.update(42, |old| {
            assert!(old.is_none());
            Some(user(42, "x"))
        });

        assert_eq!(previous, None);
        assert_eq!(store.find(42), Some(user(42, "x")));
    }

    #[test]
    fn test_update_to_absent_removes_node() {
        let store = user_store(&ShardedBackend::default());
        store.insert(user(5, "a"));

        let previous = store.update(5, |_| None);

        assert_eq!(previous, Some(user(5, "a")));
        assert!(!store.contains_node(5));
        assert!(store.find_node(5).is_none());
    }

    #[test]
    fn test_update_to_absent_on_missing_is_idempotent() {
        let store = user_store(&ShardedBackend::default());

        assert_eq!(store.update(9, |_| None), None);
        assert_eq!(store.update(9, |_| None), None);
        assert!(!store.contains_node(9));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_update_on_placeholder_returns_none() {
        let store = user_store(&ShardedBackend::default());
        store.find_or_create_node(3);

        let previous = store.update(3, |old| {
            assert!(old.is_none());
            Some(user(3, "c"))
        });

        assert_eq!(previous, None);
        assert_eq!(store.find(3), Some(user(3, "c")));
    }

    #[test]
    fn test_update_if_present_skips_missing() {
        let store = user_store(&ShardedBackend::default());
        let mut calls = 0;

        let previous = store.update_if_present(7, |_| {
            calls += 1;
            Some(user(7, "never"))
        });

        assert_eq!(previous, None);
        assert_eq!(calls, 0);
        assert!(!store.contains_node(7));
    }

    #[test]
    fn test_update_if_present_keeps_placeholder() {
        let store = user_store(&ShardedBackend::default());
        let placeholder = store.find_or_create_node(7);

        let previous = store.update_if_present(7, |_| Some(user(7, "never")));

        assert_eq!(previous, None);
        let node = store.find_node(7).unwrap();
        assert!(Arc::ptr_eq(&node, &placeholder));
        assert_eq!(store.find(7), None);
    }

    #[test]
    fn test_update_if_present_applies() {
        let store = user_store(&StripedBackend::default());
        store.insert(user(7, "a"));

        let previous = store.update_if_present(7, |old| Some(user(old.id, "b")));

        assert_eq!(previous, Some(user(7, "a")));
        assert_eq!(store.find(7), Some(user(7, "b")));

        let previous = store.update_if_present(7, |_| None);
        assert_eq!(previous, Some(user(7, "b")));
        assert!(!store.contains_node(7));
    }

    #[test]
    fn test_delete() {
        let store = user_store(&ShardedBackend::default());
        store.insert(user(5, "a"));

        assert_eq!(store.delete(5), Some(user(5, "a")));
        assert_eq!(store.find(5), None);
        assert_eq!(store.delete(5), None);
    }

    #[test]
    fn test_delete_placeholder_returns_none() {
        let store = user_store(&ShardedBackend::default());
        store.find_or_create_node(5);

        assert_eq!(store.delete(5), None);
        assert!(!store.contains_node(5));
    }

    #[test]
    fn test_find_or_create_returns_existing() {
        let store = user_store(&ShardedBackend::default());
        let first = store.find_or_create_node(1);
        let second = store.find_or_create_node(1);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_count_ignores_placeholders() {
        let store = user_store(&ShardedBackend::default());
        store.find_or_create_node(1);
        store.insert(user(2, "b"));

        assert_eq!(store.nodes().len(), 2);
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.count(), 1);
        assert_eq!(store.find_all(), vec![user(2, "b")]);
    }

    #[test]
    fn test_rewrap_preserves_node_state() {
        let store = user_store(&ShardedBackend::default());

        // A guild references the user before the user's data arrives
        let placeholder = store.find_or_create_node(10);
        placeholder.guild_ids.lock().push(99);

        store.insert(user(10, "late"));
        store.update(10, |old| old.map(|u| user(u.id, "renamed")));

        let node = store.find_node(10).unwrap();
        assert_eq!(node.user, Some(user(10, "renamed")));
        assert_eq!(*node.guild_ids.lock(), vec![99]);
    }

    #[test]
    fn test_clear() {
        let store = user_store(&StripedBackend::default());
        store.insert(user(1, "a"));
        store.insert(user(2, "b"));
        store.find_or_create_node(3);

        store.clear();

        assert_eq!(store.node_count(), 0);
        assert!(store.find_all().is_empty());
    }

    #[test]
    fn test_debug_reports_node_count() {
        let store = user_store(&ShardedBackend::default());
        store.insert(user(1, "a"));

        assert_eq!(format!("{:?}", store), "NodeStore { nodes: 1, .. }");
    }
}
