use std::net::SocketAddr;

use log::{info, trace, warn};
use replicast_serde::{BitReader, BitWriter};

use crate::{
    config::ReplicationConfig,
    participant::{command::CommandMask, participant::Participant, table::ParticipantTable},
    protocol::{
        error::ProtocolError, header::MessageHeader, message_kind::MessageKind,
        received_command::ReceivedCommand,
    },
    replica::{
        permissions::InterfaceMask,
        registry::{Registry, ReplicaKey},
        replica::{HookResult, ReplicaRef},
    },
    transport::{PacketSender, Recipients, SendMode},
};

/// The replication engine.
///
/// Tracks locally registered replicas and a set of participants, queues
/// commands per (replica, participant) pair, and drains them in dependency
/// order on each [`tick`](Self::tick). The intended driving loop mirrors the
/// transport's own callbacks: feed connection events to
/// [`handle_connection`](Self::handle_connection) /
/// [`handle_disconnection`](Self::handle_disconnection), feed each inbound
/// datagram to [`receive_packet`](Self::receive_packet), then call `tick`
/// once the transport has drained.
pub struct ReplicaManager {
    pub(crate) config: ReplicationConfig,
    pub(crate) registry: Registry,
    pub(crate) participants: ParticipantTable,
}

impl ReplicaManager {
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            participants: ParticipantTable::new(),
        }
    }

    // Configuration

    /// Do or don't automatically add newly connected peers as participants.
    /// Peers already connected when this is toggled are not added.
    pub fn set_auto_participate_new_connections(&mut self, auto_add: bool) {
        self.config.auto_participate_new_connections = auto_add;
    }

    /// Do or don't queue constructions for every registered replica when a
    /// participant is added. Has no effect on existing participants.
    pub fn set_auto_construct_to_new_participants(&mut self, auto_construct: bool) {
        self.config.auto_construct_to_new_participants = auto_construct;
    }

    /// Scope recorded for newly constructed remote objects. Existing mirror
    /// entries keep the scope they have.
    pub fn set_default_scope(&mut self, scope: bool) {
        self.config.default_scope = scope;
    }

    /// Channel used for every send issued by the engine
    pub fn set_send_channel(&mut self, channel: u8) {
        self.config.send_channel = channel;
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    // Participants

    /// Opt a peer into replication traffic. Only participants receive our
    /// messages, and only their packets are accepted. Returns false if the
    /// peer was already a participant.
    pub fn add_participant(&mut self, address: &SocketAddr) -> bool {
        if self.participants.contains(address) {
            return false;
        }
        let mut participant = Participant::new(*address);
        if self.config.auto_construct_to_new_participants {
            let mut command = CommandMask::EXPLICIT_CONSTRUCT;
            if self.config.default_scope {
                command.insert(CommandMask::SCOPE_TRUE);
            }
            for key in self.registry.keys() {
                participant.enqueue(key, command);
            }
        }
        self.participants.insert(participant);
        info!("added replication participant {}", address);
        true
    }

    /// Remove a participant, flushing everything queued for it with no wire
    /// side effects and no destruction callbacks; the peer is gone. Safe to
    /// call for unknown addresses.
    pub fn remove_participant(&mut self, address: &SocketAddr) -> bool {
        let removed = self.participants.remove(address).is_some();
        if removed {
            info!("removed replication participant {}", address);
        }
        removed
    }

    pub fn is_participant(&self, address: &SocketAddr) -> bool {
        self.participants.contains(address)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    // Registry

    /// Track a replica so commands and received messages referencing it are
    /// honored. Implied by the command operations; duplicate calls are safe.
    pub fn reference(&mut self, replica: &ReplicaRef) -> ReplicaKey {
        self.registry.reference(replica)
    }

    /// Stop tracking a replica and drop every queued command and mirror
    /// entry for it, across all participants. No messages are sent. Call
    /// this before the application frees the object.
    pub fn dereference(&mut self, replica: &ReplicaRef) {
        if let Some(key) = self.registry.dereference(replica) {
            self.participants.purge(&key);
        }
    }

    /// Allow hooks named in `permissions` to run for this replica
    pub fn enable_interfaces(&mut self, replica: &ReplicaRef, permissions: InterfaceMask) {
        match self
            .registry
            .key_of(replica)
            .and_then(|key| self.registry.get_mut(&key))
        {
            Some(record) => record.permissions.insert(permissions),
            None => warn!("enable_interfaces ignored: replica is not registered"),
        }
    }

    /// Forbid hooks named in `permissions` from running for this replica
    pub fn disable_interfaces(&mut self, replica: &ReplicaRef, permissions: InterfaceMask) {
        match self
            .registry
            .key_of(replica)
            .and_then(|key| self.registry.get_mut(&key))
        {
            Some(record) => record.permissions.remove(permissions),
            None => warn!("disable_interfaces ignored: replica is not registered"),
        }
    }

    /// How many replicas are currently registered
    pub fn replica_count(&self) -> usize {
        self.registry.count()
    }

    /// A registered replica by index, `0..replica_count()`. The order is
    /// arbitrary but holds between mutations; dereferencing shifts later
    /// indexes down.
    pub fn replica_at(&self, index: usize) -> Option<ReplicaRef> {
        self.registry.at_index(index)
    }

    // Commands

    /// Queue construction of a replica on the targeted participants. The
    /// `send_construction` hook runs during a later tick, once the replica
    /// has a network identifier; participants that already have the object
    /// are skipped.
    pub fn construct(&mut self, replica: &ReplicaRef, recipients: Recipients) {
        self.enqueue_command(replica, recipients, CommandMask::EXPLICIT_CONSTRUCT);
    }

    /// Like [`construct`](Self::construct), but assume the remote side can
    /// build the object from a bare announcement: no hook call, no payload.
    pub fn construct_implicit(&mut self, replica: &ReplicaRef, recipients: Recipients) {
        self.enqueue_command(replica, recipients, CommandMask::IMPLICIT_CONSTRUCT);
    }

    /// Queue a scope change. Serialize messages flow only while a replica is
    /// in scope; commanding scope true also triggers an immediate serialize
    /// for replicas with the serialize permission.
    pub fn set_scope(&mut self, replica: &ReplicaRef, in_scope: bool, recipients: Recipients) {
        let command = if in_scope {
            CommandMask::SCOPE_TRUE
        } else {
            CommandMask::SCOPE_FALSE
        };
        self.enqueue_command(replica, recipients, command);
    }

    /// Signal that the replica's state changed and `send_serialize` should
    /// run. Repeated signals before the tick collapse into one.
    pub fn signal_serialize(&mut self, replica: &ReplicaRef, recipients: Recipients) {
        self.enqueue_command(replica, recipients, CommandMask::SERIALIZE);
    }

    fn enqueue_command(
        &mut self,
        replica: &ReplicaRef,
        recipients: Recipients,
        command: CommandMask,
    ) {
        // first mention of a replica registers it
        let key = self.registry.reference(replica);
        for (address, participant) in self.participants.iter_mut() {
            if recipients.includes(address) {
                participant.enqueue(key, command);
            }
        }
    }

    /// Tear the replica down on the targeted participants, immediately: the
    /// `send_destruction` hook runs now, the destruction message goes out
    /// now, and every pending command for the pair is cancelled. The local
    /// registration survives; pair with [`dereference`](Self::dereference)
    /// when the local object goes away too.
    pub fn destruct(
        &mut self,
        replica: &ReplicaRef,
        recipients: Recipients,
        sender: &mut dyn PacketSender,
    ) {
        let Some(key) = self.registry.key_of(replica) else {
            warn!("destruct ignored: replica is not registered");
            return;
        };
        let network_id = replica.borrow().network_id();
        let mut reusable_payload: Option<(Vec<u8>, u32)> = None;

        for address in self.participants.addresses() {
            if !recipients.includes(&address) {
                continue;
            }
            let Some(participant) = self.participants.get_mut(&address) else {
                continue;
            };
            participant.commands.remove(&key);
            if participant.mirror.remove(&key).is_none() {
                continue;
            }
            // peers that never learned the identifier cannot be told
            let Some(network_id) = network_id else {
                continue;
            };

            let payload = match reusable_payload.clone() {
                Some(payload) => payload,
                None => {
                    let mut out = BitWriter::new();
                    let result = replica.borrow_mut().send_destruction(&address, &mut out);
                    let bits = out.bits_written();
                    match result {
                        HookResult::Cancel => continue,
                        // aborts this participant only; the rest of the
                        // targets still get flushed and notified
                        HookResult::StopProcessing => continue,
                        HookResult::Continue | HookResult::BroadcastIdentically => {
                            if bits == 0 {
                                // suppressed wire message; the mirror entry
                                // is already gone
                                continue;
                            }
                            let payload = (out.to_bytes(), bits);
                            if result == HookResult::BroadcastIdentically {
                                reusable_payload = Some(payload.clone());
                            }
                            payload
                        }
                    }
                }
            };

            let mut writer = BitWriter::new();
            MessageHeader::Destruction { network_id }.encode(&mut writer);
            writer.append_bits(&payload.0, payload.1);
            let bytes = writer.to_bytes();
            sender.send(
                &address,
                self.config.send_channel,
                SendMode::ReliableOrdered,
                &bytes,
            );
        }
    }

    // Queries

    /// Whether a construction for this replica has gone out to (or come in
    /// from) the given participant, with no destruction since
    pub fn is_constructed(&self, replica: &ReplicaRef, address: &SocketAddr) -> bool {
        let Some(key) = self.registry.key_of(replica) else {
            return false;
        };
        self.participants
            .get(address)
            .map(|participant| participant.mirror.contains_key(&key))
            .unwrap_or(false)
    }

    /// Whether the replica is currently in scope for the given participant
    pub fn is_in_scope(&self, replica: &ReplicaRef, address: &SocketAddr) -> bool {
        let Some(key) = self.registry.key_of(replica) else {
            return false;
        };
        self.participants
            .get(address)
            .and_then(|participant| participant.mirror.get(&key))
            .map(|remote| remote.in_scope)
            .unwrap_or(false)
    }

    // Transport events

    /// A peer connected. Adds it as a participant when
    /// `auto_participate_new_connections` is set.
    pub fn handle_connection(&mut self, address: &SocketAddr) {
        if self.config.auto_participate_new_connections {
            self.add_participant(address);
        }
    }

    /// A peer disconnected or its connection was closed
    pub fn handle_disconnection(&mut self, address: &SocketAddr) {
        self.remove_participant(address);
    }

    /// The local peer shut down: forget all participants and registrations
    pub fn reset(&mut self) {
        self.participants.clear();
        self.registry.clear();
    }

    /// One inbound datagram. Decodes the fixed header and parks the rest in
    /// the sender's receive queue; no application callback fires here, so
    /// the application may create the target object or assign its identifier
    /// any time before the dispatching tick.
    pub fn receive_packet(&mut self, sender: &SocketAddr, payload: &[u8]) {
        if !self.participants.contains(sender) {
            trace!("dropping packet from non-participant {}", sender);
            return;
        }
        if let Err(error) = self.try_receive_packet(sender, payload) {
            warn!("dropping packet: {}", error);
        }
    }

    fn try_receive_packet(
        &mut self,
        sender: &SocketAddr,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        let mut reader = BitReader::new(payload);
        let byte = reader
            .read_byte()
            .map_err(|_| ProtocolError::EmptyPacket { sender: *sender })?;
        let kind = MessageKind::from_byte(byte).ok_or(ProtocolError::UnknownKind {
            byte,
            sender: *sender,
        })?;
        let header =
            MessageHeader::decode(kind, &mut reader).map_err(|source| {
                ProtocolError::MalformedHeader {
                    kind,
                    sender: *sender,
                    source,
                }
            })?;
        let command = ReceivedCommand::new(*sender, &header, reader.to_owned());
        if let Some(participant) = self.participants.get_mut(sender) {
            participant.received.push_back(command);
        }
        Ok(())
    }
}
