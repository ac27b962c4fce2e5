use std::{
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use crate::{
    replica::{permissions::InterfaceMask, replica::ReplicaRef},
    time::WireInstant,
};

/// Stable engine-issued handle naming a registered replica.
///
/// Participant state (command lists, remote-object mirrors) holds these
/// instead of object references; they resolve through the [`Registry`] and
/// become invalid when the replica is dereferenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplicaKey(u64);

impl ReplicaKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Engine-owned record for one tracked replica
pub(crate) struct RegisteredReplica {
    pub replica: ReplicaRef,
    /// Last time `receive_serialize` returned `Applied` for this object
    pub last_deserialize_true: WireInstant,
    pub permissions: InterfaceMask,
}

/// The authoritative set of locally tracked replicas.
///
/// Keyed by [`ReplicaKey`] with a pointer-identity index on the side, so
/// registering the same shared handle twice is a no-op. Enumeration order is
/// stable between mutations; indexes shift after a dereference.
pub(crate) struct Registry {
    next_key: u64,
    replicas: BTreeMap<ReplicaKey, RegisteredReplica>,
    identities: HashMap<usize, ReplicaKey>,
}

fn identity(replica: &ReplicaRef) -> usize {
    Rc::as_ptr(replica) as *const () as usize
}

impl Registry {
    pub fn new() -> Self {
        Self {
            next_key: 0,
            replicas: BTreeMap::new(),
            identities: HashMap::new(),
        }
    }

    /// Track a replica. Duplicate calls are safe and return the existing key.
    pub fn reference(&mut self, replica: &ReplicaRef) -> ReplicaKey {
        if let Some(key) = self.identities.get(&identity(replica)) {
            return *key;
        }
        let key = ReplicaKey(self.next_key);
        self.next_key += 1;
        self.identities.insert(identity(replica), key);
        self.replicas.insert(
            key,
            RegisteredReplica {
                replica: replica.clone(),
                last_deserialize_true: WireInstant::ZERO,
                permissions: InterfaceMask::all(),
            },
        );
        key
    }

    /// Stop tracking a replica. Returns the key it held so the caller can
    /// purge participant state; no wire traffic results.
    pub fn dereference(&mut self, replica: &ReplicaRef) -> Option<ReplicaKey> {
        let key = self.identities.remove(&identity(replica))?;
        self.replicas.remove(&key);
        Some(key)
    }

    pub fn key_of(&self, replica: &ReplicaRef) -> Option<ReplicaKey> {
        self.identities.get(&identity(replica)).copied()
    }

    pub fn get(&self, key: &ReplicaKey) -> Option<&RegisteredReplica> {
        self.replicas.get(key)
    }

    pub fn get_mut(&mut self, key: &ReplicaKey) -> Option<&mut RegisteredReplica> {
        self.replicas.get_mut(key)
    }

    pub fn contains(&self, key: &ReplicaKey) -> bool {
        self.replicas.contains_key(key)
    }

    pub fn count(&self) -> usize {
        self.replicas.len()
    }

    pub fn at_index(&self, index: usize) -> Option<ReplicaRef> {
        self.replicas
            .values()
            .nth(index)
            .map(|record| record.replica.clone())
    }

    pub fn keys(&self) -> impl Iterator<Item = ReplicaKey> + '_ {
        self.replicas.keys().copied()
    }

    pub fn clear(&mut self) {
        self.replicas.clear();
        self.identities.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::test_support::inert_replica;

    #[test]
    fn reference_is_idempotent() {
        let mut registry = Registry::new();
        let replica = inert_replica();

        let first = registry.reference(&replica);
        let second = registry.reference(&replica);

        assert_eq!(first, second);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn dereference_forgets_identity() {
        let mut registry = Registry::new();
        let replica = inert_replica();

        let key = registry.reference(&replica);
        assert_eq!(registry.dereference(&replica), Some(key));
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.dereference(&replica), None);

        // a re-registration gets a fresh key
        let rekey = registry.reference(&replica);
        assert_ne!(key, rekey);
    }

    #[test]
    fn enumeration_shifts_after_dereference() {
        let mut registry = Registry::new();
        let first = inert_replica();
        let second = inert_replica();

        registry.reference(&first);
        registry.reference(&second);
        assert_eq!(registry.count(), 2);
        assert!(registry.at_index(1).is_some());

        registry.dereference(&first);
        assert_eq!(registry.count(), 1);
        let remaining = registry.at_index(0).unwrap();
        assert!(Rc::ptr_eq(&remaining, &second));
        assert!(registry.at_index(1).is_none());
    }
}
