//! Replicated containers: a keyed map and an insertion-ordered list.
//!
//! Both share the variable permission model. Every structural or value
//! change emits a single event carrying the kind and the affected key or
//! index; consumers treat events as a signal to recompute derived views
//! from the full collection state, never as a diff stream.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::ReplicationError;
use crate::permission::{Principal, VarPermission};
use crate::var::SubscriptionId;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The kind of change a collection mutation produced.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    /// A new entry was inserted.
    Added,
    /// An existing entry was removed.
    Removed,
    /// An existing entry's value was replaced.
    Updated,
}

/// Change event for [`ReplicatedMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEvent<K> {
    /// What happened.
    pub change: EntryChange,
    /// The affected key.
    pub key: K,
}

/// Change event for [`ReplicatedList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEvent {
    /// What happened.
    pub change: EntryChange,
    /// The affected index.
    pub index: usize,
}

// ---------------------------------------------------------------------------
// ReplicatedMap
// ---------------------------------------------------------------------------

type MapCallback<K> = Box<dyn FnMut(&MapEvent<K>)>;

/// A keyed replicated container. Keys are unique; iteration order is
/// unspecified (rankings are computed from the full state, never read off
/// the container's order).
pub struct ReplicatedMap<K, V> {
    entries: HashMap<K, V>,
    permission: VarPermission,
    subscribers: Vec<(SubscriptionId, MapCallback<K>)>,
    next_subscription: u64,
}

impl<K: Eq + Hash + Clone, V> ReplicatedMap<K, V> {
    /// Creates an empty map with the given permission policy.
    pub fn new(permission: VarPermission) -> Self {
        Self {
            entries: HashMap::new(),
            permission,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Inserts a new entry. Fails with `DuplicateKey` if the key exists.
    pub fn add(&mut self, key: K, value: V, principal: Principal) -> Result<(), ReplicationError> {
        if !self.permission.allows_write(principal) {
            return Err(ReplicationError::PermissionDenied);
        }
        if self.entries.contains_key(&key) {
            return Err(ReplicationError::DuplicateKey);
        }
        self.entries.insert(key.clone(), value);
        self.emit(EntryChange::Added, key);
        Ok(())
    }

    /// Removes an entry, returning its value. Fails with `NotFound` if the
    /// key does not exist.
    pub fn remove(&mut self, key: &K, principal: Principal) -> Result<V, ReplicationError> {
        if !self.permission.allows_write(principal) {
            return Err(ReplicationError::PermissionDenied);
        }
        let value = self.entries.remove(key).ok_or(ReplicationError::NotFound)?;
        self.emit(EntryChange::Removed, key.clone());
        Ok(value)
    }

    /// Replaces an existing entry's value only. Fails with `NotFound` if the
    /// key does not exist (use [`add`](Self::add) to create entries).
    pub fn set(&mut self, key: K, value: V, principal: Principal) -> Result<(), ReplicationError> {
        if !self.permission.allows_write(principal) {
            return Err(ReplicationError::PermissionDenied);
        }
        let slot = self.entries.get_mut(&key).ok_or(ReplicationError::NotFound)?;
        *slot = value;
        self.emit(EntryChange::Updated, key);
        Ok(())
    }

    /// Looks up an entry.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Returns `true` if the key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries (unspecified order).
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Registers a change callback.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&MapEvent<K>) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a previously registered callback.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    fn emit(&mut self, change: EntryChange, key: K) {
        let event = MapEvent { change, key };
        for (_, callback) in &mut self.subscribers {
            callback(&event);
        }
    }
}

// ---------------------------------------------------------------------------
// ReplicatedList
// ---------------------------------------------------------------------------

type ListCallback = Box<dyn FnMut(&ListEvent)>;

/// An insertion-ordered replicated container. Append-oriented: entries are
/// immutable once added (the message log is its consumer).
pub struct ReplicatedList<T> {
    entries: Vec<T>,
    permission: VarPermission,
    subscribers: Vec<(SubscriptionId, ListCallback)>,
    next_subscription: u64,
}

impl<T> ReplicatedList<T> {
    /// Creates an empty list with the given permission policy.
    pub fn new(permission: VarPermission) -> Self {
        Self {
            entries: Vec::new(),
            permission,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Appends a value, returning its index.
    pub fn push(&mut self, value: T, principal: Principal) -> Result<usize, ReplicationError> {
        if !self.permission.allows_write(principal) {
            return Err(ReplicationError::PermissionDenied);
        }
        self.entries.push(value);
        let index = self.entries.len() - 1;
        let event = ListEvent {
            change: EntryChange::Added,
            index,
        };
        for (_, callback) in &mut self.subscribers {
            callback(&event);
        }
        Ok(index)
    }

    /// Returns the entry at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Registers a change callback.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ListEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
