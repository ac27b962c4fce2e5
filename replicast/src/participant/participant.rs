use std::{
    collections::{BTreeMap, VecDeque},
    net::SocketAddr,
};

use crate::{
    participant::{command::CommandMask, remote_object::RemoteObject},
    protocol::received_command::ReceivedCommand,
    replica::registry::ReplicaKey,
};

/// One remote peer opted into replication traffic
pub(crate) struct Participant {
    pub address: SocketAddr,
    /// Send the download-complete message once the initial construction
    /// batch has drained. Set on entry, cleared after the one emission.
    pub call_download_complete: bool,
    /// Pending outbound work, one merged mask per replica
    pub commands: BTreeMap<ReplicaKey, CommandMask>,
    /// Replicas this peer is known to have constructed
    pub mirror: BTreeMap<ReplicaKey, RemoteObject>,
    /// Decoded incoming messages awaiting dispatch
    pub received: VecDeque<ReceivedCommand>,
}

impl Participant {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            call_download_complete: true,
            commands: BTreeMap::new(),
            mirror: BTreeMap::new(),
            received: VecDeque::new(),
        }
    }

    /// Merge a command into this participant's list. Construction flags
    /// toward a replica the peer already constructed are discarded; the
    /// mirror entry is the record of truth.
    pub fn enqueue(&mut self, key: ReplicaKey, command: CommandMask) {
        let mut command = command;
        if self.mirror.contains_key(&key) {
            command.remove(CommandMask::constructions());
        }
        if command.is_empty() {
            return;
        }
        self.commands
            .entry(key)
            .or_insert_with(CommandMask::empty)
            .merge(command);
    }

    /// Drop every trace of a replica: pending commands and mirror entry
    pub fn purge(&mut self, key: &ReplicaKey) {
        self.commands.remove(key);
        self.mirror.remove(key);
    }

    pub fn has_pending_construction(&self) -> bool {
        self.commands.values().any(|mask| mask.has_construction())
    }
}
