use std::{collections::BTreeMap, net::SocketAddr};

use crate::{participant::participant::Participant, replica::registry::ReplicaKey};

/// The set of active participants, keyed by peer address
pub(crate) struct ParticipantTable {
    participants: BTreeMap<SocketAddr, Participant>,
}

impl ParticipantTable {
    pub fn new() -> Self {
        Self {
            participants: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, participant: Participant) {
        self.participants.insert(participant.address, participant);
    }

    pub fn remove(&mut self, address: &SocketAddr) -> Option<Participant> {
        self.participants.remove(address)
    }

    pub fn contains(&self, address: &SocketAddr) -> bool {
        self.participants.contains_key(address)
    }

    pub fn get(&self, address: &SocketAddr) -> Option<&Participant> {
        self.participants.get(address)
    }

    pub fn get_mut(&mut self, address: &SocketAddr) -> Option<&mut Participant> {
        self.participants.get_mut(address)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SocketAddr, &mut Participant)> {
        self.participants.iter_mut()
    }

    /// Snapshot of the current addresses, for loops that may remove entries
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.participants.keys().copied().collect()
    }

    /// Drop every trace of a replica from every participant
    pub fn purge(&mut self, key: &ReplicaKey) {
        for participant in self.participants.values_mut() {
            participant.purge(key);
        }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }
}
