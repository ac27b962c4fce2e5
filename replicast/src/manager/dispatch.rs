use std::{collections::HashMap, net::SocketAddr};

use log::{info, trace, warn};
use replicast_serde::BitWriter;

use crate::{
    manager::{
        events::{ConstructionOutcome, ReplicationEvents},
        manager::ReplicaManager,
    },
    participant::{command::CommandMask, remote_object::RemoteObject},
    protocol::{
        header::MessageHeader, message_kind::MessageKind, received_command::ReceivedCommand,
    },
    replica::{
        permissions::InterfaceMask,
        registry::ReplicaKey,
        replica::{DeserializeResult, HookResult, ReplicaRef},
    },
    time::WireInstant,
    transport::{PacketSender, SendMode},
    types::NetworkId,
};

/// A payload some hook flagged as identical for every participant, reusable
/// for the rest of the tick. Slotted by replica, message kind, and the
/// scope-change value where one applies.
#[derive(Clone)]
struct CachedPayload {
    bytes: Vec<u8>,
    bits: u32,
    include_timestamp: bool,
}

#[derive(Default)]
struct BroadcastCache {
    payloads: HashMap<(ReplicaKey, MessageKind, u8), CachedPayload>,
}

/// What became of one received command
enum ReceiveDisposition {
    Continue,
    /// Leave the rest of the queue for the next tick
    Stop,
    /// Put the command back at the head and stop
    Requeue(ReceivedCommand),
    RemoveParticipant,
}

/// What became of one outbound emission attempt
enum EmitOutcome {
    Sent,
    /// The hook declined; the command and its dependents are dropped
    Cancelled,
    /// Nothing to send this tick; the command stays queued
    Skipped,
    /// A hook asked to stop processing this participant until next tick
    Aborted,
}

impl ReplicaManager {
    /// Run one dispatch cycle, in the order the transport implies: drain each
    /// participant's received commands, walk its outbound command list in
    /// dependency order, then settle the one-shot download-complete message.
    pub fn tick(
        &mut self,
        now: WireInstant,
        events: &mut dyn ReplicationEvents,
        sender: &mut dyn PacketSender,
    ) {
        let mut cache = BroadcastCache::default();
        for address in self.participants.addresses() {
            if !self.drain_received(&address, now, events) {
                // participant removed mid-drain
                continue;
            }
            if !self.emit_outbound(&address, now, sender, &mut cache) {
                // a hook aborted this participant's tick
                continue;
            }
            self.flush_download_complete(&address, now, events, sender);
        }
    }

    // Phase A: received commands

    fn drain_received(
        &mut self,
        address: &SocketAddr,
        now: WireInstant,
        events: &mut dyn ReplicationEvents,
    ) -> bool {
        loop {
            let Some(command) = self
                .participants
                .get_mut(address)
                .and_then(|participant| participant.received.pop_front())
            else {
                return true;
            };
            match self.process_received(command, now, events) {
                ReceiveDisposition::Continue => {}
                ReceiveDisposition::Stop => return true,
                ReceiveDisposition::Requeue(command) => {
                    if let Some(participant) = self.participants.get_mut(address) {
                        participant.received.push_front(command);
                    }
                    return true;
                }
                ReceiveDisposition::RemoveParticipant => {
                    self.remove_participant(address);
                    return false;
                }
            }
        }
    }

    fn process_received(
        &mut self,
        command: ReceivedCommand,
        now: WireInstant,
        events: &mut dyn ReplicationEvents,
    ) -> ReceiveDisposition {
        match command.kind {
            MessageKind::Construction => self.process_received_construction(command, events),
            MessageKind::Destruction => self.process_received_destruction(command, events),
            MessageKind::ScopeChange => self.process_received_scope_change(command, events),
            MessageKind::Serialize => self.process_received_serialize(command, now, events),
            MessageKind::DownloadComplete => {
                let mut payload = command.payload.borrow();
                events.receive_download_complete(&command.sender, &mut payload);
                ReceiveDisposition::Continue
            }
        }
    }

    fn process_received_construction(
        &mut self,
        command: ReceivedCommand,
        events: &mut dyn ReplicationEvents,
    ) -> ReceiveDisposition {
        let Some(network_id) = command.network_id else {
            return ReceiveDisposition::Continue;
        };
        if let Some(existing) = events.resolve_network_id(&network_id) {
            if self.registry.key_of(&existing).is_some() {
                trace!(
                    "dropping duplicate construction of {:?} from {}",
                    network_id,
                    command.sender
                );
                return ReceiveDisposition::Continue;
            }
        }

        let outcome = {
            let mut payload = command.payload.borrow();
            events.resolve_construction(&command.sender, network_id, command.timestamp, &mut payload)
        };
        match outcome {
            ConstructionOutcome::Created(replica) => {
                let key = self.registry.reference(&replica);
                self.record_constructed(&command.sender, key);
                ReceiveDisposition::Continue
            }
            ConstructionOutcome::Defer => ReceiveDisposition::Requeue(command),
            ConstructionOutcome::Cancel => ReceiveDisposition::Continue,
            ConstructionOutcome::Fatal => {
                warn!(
                    "construction of {:?} from {} rejected as fatal",
                    network_id, command.sender
                );
                ReceiveDisposition::RemoveParticipant
            }
        }
    }

    fn process_received_destruction(
        &mut self,
        command: ReceivedCommand,
        events: &mut dyn ReplicationEvents,
    ) -> ReceiveDisposition {
        let Some((key, replica)) = self.resolve_registered(&command.network_id, events) else {
            trace!("dropping destruction of unknown object from {}", command.sender);
            return ReceiveDisposition::Continue;
        };
        let result = {
            let mut payload = command.payload.borrow();
            replica
                .borrow_mut()
                .receive_destruction(&command.sender, &mut payload)
        };
        if let Some(participant) = self.participants.get_mut(&command.sender) {
            participant.mirror.remove(&key);
        }
        match result {
            HookResult::StopProcessing => ReceiveDisposition::Stop,
            _ => ReceiveDisposition::Continue,
        }
    }

    fn process_received_scope_change(
        &mut self,
        command: ReceivedCommand,
        events: &mut dyn ReplicationEvents,
    ) -> ReceiveDisposition {
        let Some((key, replica)) = self.resolve_registered(&command.network_id, events) else {
            trace!(
                "dropping scope change of unknown object from {}",
                command.sender
            );
            return ReceiveDisposition::Continue;
        };
        if !self.permits(&key, InterfaceMask::RECEIVE_SCOPE_CHANGE) {
            return ReceiveDisposition::Continue;
        }
        let mirrored = self
            .participants
            .get(&command.sender)
            .map(|participant| participant.mirror.contains_key(&key))
            .unwrap_or(false);
        if !mirrored {
            trace!(
                "dropping scope change of unconstructed object from {}",
                command.sender
            );
            return ReceiveDisposition::Continue;
        }

        let in_scope = command.aux != 0;
        let result = {
            let mut payload = command.payload.borrow();
            replica
                .borrow_mut()
                .receive_scope_change(in_scope, &command.sender, &mut payload)
        };
        if result != HookResult::Cancel {
            if let Some(remote) = self
                .participants
                .get_mut(&command.sender)
                .and_then(|participant| participant.mirror.get_mut(&key))
            {
                remote.in_scope = in_scope;
            }
        }
        match result {
            HookResult::StopProcessing => ReceiveDisposition::Stop,
            _ => ReceiveDisposition::Continue,
        }
    }

    fn process_received_serialize(
        &mut self,
        command: ReceivedCommand,
        now: WireInstant,
        events: &mut dyn ReplicationEvents,
    ) -> ReceiveDisposition {
        let Some((key, replica)) = self.resolve_registered(&command.network_id, events) else {
            trace!("dropping serialize of unknown object from {}", command.sender);
            return ReceiveDisposition::Continue;
        };
        if !self.permits(&key, InterfaceMask::SERIALIZE) {
            return ReceiveDisposition::Continue;
        }
        let in_scope = self
            .participants
            .get(&command.sender)
            .and_then(|participant| participant.mirror.get(&key))
            .map(|remote| remote.in_scope)
            .unwrap_or(false);
        if !in_scope {
            trace!(
                "dropping serialize of out-of-scope object from {}",
                command.sender
            );
            return ReceiveDisposition::Continue;
        }

        let last_applied = self
            .registry
            .get(&key)
            .map(|record| record.last_deserialize_true)
            .unwrap_or(WireInstant::ZERO);
        let outcome = {
            let mut payload = command.payload.borrow();
            replica.borrow_mut().receive_serialize(
                &command.sender,
                command.timestamp,
                last_applied,
                &mut payload,
            )
        };
        if outcome == DeserializeResult::Applied {
            if let Some(record) = self.registry.get_mut(&key) {
                record.last_deserialize_true = now;
            }
        }
        ReceiveDisposition::Continue
    }

    fn resolve_registered(
        &self,
        network_id: &Option<NetworkId>,
        events: &dyn ReplicationEvents,
    ) -> Option<(ReplicaKey, ReplicaRef)> {
        let network_id = network_id.as_ref()?;
        let replica = events.resolve_network_id(network_id)?;
        // untracked objects are ignored even when the identifier resolves
        let key = self.registry.key_of(&replica)?;
        Some((key, replica))
    }

    fn permits(&self, key: &ReplicaKey, permission: InterfaceMask) -> bool {
        self.registry
            .get(key)
            .map(|record| record.permissions.contains(permission))
            .unwrap_or(false)
    }

    // Phase B: outbound commands

    fn emit_outbound(
        &mut self,
        address: &SocketAddr,
        now: WireInstant,
        sender: &mut dyn PacketSender,
        cache: &mut BroadcastCache,
    ) -> bool {
        let keys: Vec<ReplicaKey> = match self.participants.get(address) {
            Some(participant) => participant.commands.keys().copied().collect(),
            None => return true,
        };

        for key in keys {
            let Some(mut mask) = self
                .participants
                .get(address)
                .and_then(|participant| participant.commands.get(&key).copied())
            else {
                continue;
            };

            let (replica, permissions) = match self.registry.get(&key) {
                Some(record) => (record.replica.clone(), record.permissions),
                None => {
                    // dereference purges every participant, so this is stale
                    if let Some(participant) = self.participants.get_mut(address) {
                        participant.commands.remove(&key);
                    }
                    continue;
                }
            };

            // a missing send permission clears only the flags it covers
            if mask.has_construction() && !permissions.contains(InterfaceMask::SEND_CONSTRUCTION) {
                mask.remove(CommandMask::constructions());
            }
            if mask.scope_command().is_some()
                && !permissions.contains(InterfaceMask::SEND_SCOPE_CHANGE)
            {
                mask.remove(CommandMask::scopes());
            }
            if mask.contains(CommandMask::SERIALIZE)
                && !permissions.contains(InterfaceMask::SERIALIZE)
            {
                mask.remove(CommandMask::SERIALIZE);
            }
            if mask.is_empty() {
                self.store_mask(address, key, mask);
                continue;
            }

            // every wire message names the replica by identifier; until one
            // is assigned the whole entry waits, dependents included
            let network_id = replica.borrow().network_id();
            let Some(network_id) = network_id else {
                self.store_mask(address, key, mask);
                continue;
            };

            if mask.contains(CommandMask::EXPLICIT_CONSTRUCT) {
                match self.emit_explicit_construction(
                    address, key, &replica, network_id, now, sender, cache,
                ) {
                    EmitOutcome::Sent => mask.remove(CommandMask::constructions()),
                    EmitOutcome::Cancelled => {
                        // cancelling a construction cancels its dependents
                        mask.clear();
                    }
                    EmitOutcome::Aborted => {
                        self.store_mask(address, key, mask);
                        return false;
                    }
                    EmitOutcome::Skipped => {}
                }
            } else if mask.contains(CommandMask::IMPLICIT_CONSTRUCT) {
                self.emit_implicit_construction(address, key, network_id, sender);
                mask.remove(CommandMask::constructions());
            }

            if mask.is_empty() {
                self.store_mask(address, key, mask);
                continue;
            }

            if let Some(commanded) = mask.scope_command() {
                let current = self
                    .participants
                    .get(address)
                    .and_then(|participant| participant.mirror.get(&key))
                    .map(|remote| remote.in_scope);
                match current {
                    // scope only means anything for a constructed object
                    // whose recorded value disagrees
                    None => mask.remove(CommandMask::scopes()),
                    Some(current) if current == commanded => mask.remove(CommandMask::scopes()),
                    Some(_) => {
                        match self.emit_scope_change(
                            address, key, &replica, network_id, commanded, now, sender, cache,
                        ) {
                            EmitOutcome::Sent => {
                                mask.remove(CommandMask::scopes());
                                // coming into scope implies a fresh snapshot
                                if commanded && permissions.contains(InterfaceMask::SERIALIZE) {
                                    mask.insert(CommandMask::SERIALIZE);
                                }
                            }
                            EmitOutcome::Cancelled => mask.remove(CommandMask::scopes()),
                            EmitOutcome::Aborted => {
                                self.store_mask(address, key, mask);
                                return false;
                            }
                            EmitOutcome::Skipped => {}
                        }
                    }
                }
            }

            if mask.contains(CommandMask::SERIALIZE) {
                let remote = self
                    .participants
                    .get(address)
                    .and_then(|participant| participant.mirror.get(&key))
                    .copied();
                match remote {
                    None => mask.remove(CommandMask::SERIALIZE),
                    Some(remote) if !remote.in_scope => mask.remove(CommandMask::SERIALIZE),
                    Some(remote) => {
                        match self.emit_serialize(
                            address,
                            key,
                            &replica,
                            network_id,
                            remote.last_send,
                            now,
                            sender,
                            cache,
                        ) {
                            EmitOutcome::Sent | EmitOutcome::Cancelled => {
                                mask.remove(CommandMask::SERIALIZE)
                            }
                            // wrote nothing this tick; retried next tick
                            EmitOutcome::Skipped => {}
                            EmitOutcome::Aborted => {
                                self.store_mask(address, key, mask);
                                return false;
                            }
                        }
                    }
                }
            }

            self.store_mask(address, key, mask);
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_explicit_construction(
        &mut self,
        address: &SocketAddr,
        key: ReplicaKey,
        replica: &ReplicaRef,
        network_id: NetworkId,
        now: WireInstant,
        sender: &mut dyn PacketSender,
        cache: &mut BroadcastCache,
    ) -> EmitOutcome {
        let slot = (key, MessageKind::Construction, 0u8);
        let payload = match cache.payloads.get(&slot).cloned() {
            Some(payload) => payload,
            None => {
                let mut out = BitWriter::new();
                let mut include_timestamp = false;
                let result = replica.borrow_mut().send_construction(
                    now,
                    address,
                    &mut out,
                    &mut include_timestamp,
                );
                let bits = out.bits_written();
                match result {
                    HookResult::Cancel => return EmitOutcome::Cancelled,
                    HookResult::StopProcessing => return EmitOutcome::Aborted,
                    HookResult::Continue | HookResult::BroadcastIdentically => {
                        if bits == 0 {
                            // an empty construction is a refusal
                            return EmitOutcome::Cancelled;
                        }
                        let payload = CachedPayload {
                            bytes: out.to_bytes(),
                            bits,
                            include_timestamp,
                        };
                        if result == HookResult::BroadcastIdentically {
                            cache.payloads.insert(slot, payload.clone());
                        }
                        payload
                    }
                }
            }
        };

        let header = MessageHeader::Construction {
            network_id,
            timestamp: payload.include_timestamp.then_some(now),
        };
        self.send_message(
            address,
            &header,
            &payload.bytes,
            payload.bits,
            SendMode::ReliableOrdered,
            sender,
        );
        self.record_constructed(address, key);
        EmitOutcome::Sent
    }

    fn emit_implicit_construction(
        &mut self,
        address: &SocketAddr,
        key: ReplicaKey,
        network_id: NetworkId,
        sender: &mut dyn PacketSender,
    ) {
        let header = MessageHeader::Construction {
            network_id,
            timestamp: None,
        };
        self.send_message(address, &header, &[], 0, SendMode::ReliableOrdered, sender);
        self.record_constructed(address, key);
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_scope_change(
        &mut self,
        address: &SocketAddr,
        key: ReplicaKey,
        replica: &ReplicaRef,
        network_id: NetworkId,
        commanded: bool,
        now: WireInstant,
        sender: &mut dyn PacketSender,
        cache: &mut BroadcastCache,
    ) -> EmitOutcome {
        let slot = (key, MessageKind::ScopeChange, u8::from(commanded));
        let payload = match cache.payloads.get(&slot).cloned() {
            Some(payload) => payload,
            None => {
                let mut out = BitWriter::new();
                let result =
                    replica
                        .borrow_mut()
                        .send_scope_change(commanded, now, address, &mut out);
                let bits = out.bits_written();
                match result {
                    HookResult::Cancel => return EmitOutcome::Cancelled,
                    HookResult::StopProcessing => return EmitOutcome::Aborted,
                    HookResult::Continue | HookResult::BroadcastIdentically => {
                        if bits == 0 {
                            return EmitOutcome::Cancelled;
                        }
                        let payload = CachedPayload {
                            bytes: out.to_bytes(),
                            bits,
                            include_timestamp: false,
                        };
                        if result == HookResult::BroadcastIdentically {
                            cache.payloads.insert(slot, payload.clone());
                        }
                        payload
                    }
                }
            }
        };

        let header = MessageHeader::ScopeChange {
            network_id,
            in_scope: commanded,
        };
        self.send_message(
            address,
            &header,
            &payload.bytes,
            payload.bits,
            SendMode::ReliableOrdered,
            sender,
        );
        if let Some(remote) = self
            .participants
            .get_mut(address)
            .and_then(|participant| participant.mirror.get_mut(&key))
        {
            remote.in_scope = commanded;
        }
        EmitOutcome::Sent
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_serialize(
        &mut self,
        address: &SocketAddr,
        key: ReplicaKey,
        replica: &ReplicaRef,
        network_id: NetworkId,
        last_send: WireInstant,
        now: WireInstant,
        sender: &mut dyn PacketSender,
        cache: &mut BroadcastCache,
    ) -> EmitOutcome {
        let slot = (key, MessageKind::Serialize, 0u8);
        let payload = match cache.payloads.get(&slot).cloned() {
            Some(payload) => payload,
            None => {
                let mut out = BitWriter::new();
                let mut include_timestamp = false;
                let result = replica.borrow_mut().send_serialize(
                    now,
                    last_send,
                    address,
                    &mut out,
                    &mut include_timestamp,
                );
                let bits = out.bits_written();
                match result {
                    HookResult::Cancel => return EmitOutcome::Cancelled,
                    HookResult::StopProcessing => return EmitOutcome::Aborted,
                    HookResult::Continue | HookResult::BroadcastIdentically => {
                        if bits == 0 {
                            return EmitOutcome::Skipped;
                        }
                        let payload = CachedPayload {
                            bytes: out.to_bytes(),
                            bits,
                            include_timestamp,
                        };
                        if result == HookResult::BroadcastIdentically {
                            cache.payloads.insert(slot, payload.clone());
                        }
                        payload
                    }
                }
            }
        };

        let header = MessageHeader::Serialize {
            network_id,
            timestamp: payload.include_timestamp.then_some(now),
        };
        let mode = self.config.serialize_send_mode;
        self.send_message(address, &header, &payload.bytes, payload.bits, mode, sender);
        if let Some(remote) = self
            .participants
            .get_mut(address)
            .and_then(|participant| participant.mirror.get_mut(&key))
        {
            remote.last_send = now;
        }
        EmitOutcome::Sent
    }

    fn send_message(
        &self,
        address: &SocketAddr,
        header: &MessageHeader,
        payload_bytes: &[u8],
        payload_bits: u32,
        mode: SendMode,
        sender: &mut dyn PacketSender,
    ) {
        let mut writer = BitWriter::new();
        header.encode(&mut writer);
        writer.append_bits(payload_bytes, payload_bits);
        let bytes = writer.to_bytes();
        sender.send(address, self.config.send_channel, mode, &bytes);
    }

    /// The remote peer now has this object: mirror it with the default scope
    /// and clear any pending construction toward it
    pub(crate) fn record_constructed(&mut self, address: &SocketAddr, key: ReplicaKey) {
        let default_scope = self.config.default_scope;
        let Some(participant) = self.participants.get_mut(address) else {
            return;
        };
        participant.mirror.insert(
            key,
            RemoteObject {
                in_scope: default_scope,
                last_send: WireInstant::ZERO,
            },
        );
        let emptied = participant
            .commands
            .get_mut(&key)
            .map(|mask| {
                mask.remove(CommandMask::constructions());
                mask.is_empty()
            })
            .unwrap_or(false);
        if emptied {
            participant.commands.remove(&key);
        }
    }

    fn store_mask(&mut self, address: &SocketAddr, key: ReplicaKey, mask: CommandMask) {
        if let Some(participant) = self.participants.get_mut(address) {
            if mask.is_empty() {
                participant.commands.remove(&key);
            } else {
                participant.commands.insert(key, mask);
            }
        }
    }

    // Phase C: download complete

    fn flush_download_complete(
        &mut self,
        address: &SocketAddr,
        now: WireInstant,
        events: &mut dyn ReplicationEvents,
        sender: &mut dyn PacketSender,
    ) {
        let ready = self
            .participants
            .get(address)
            .map(|participant| {
                participant.call_download_complete && !participant.has_pending_construction()
            })
            .unwrap_or(false);
        if !ready {
            return;
        }

        let mut writer = BitWriter::new();
        MessageHeader::DownloadComplete.encode(&mut writer);
        events.send_download_complete(now, address, &mut writer);
        let bytes = writer.to_bytes();
        sender.send(
            address,
            self.config.send_channel,
            SendMode::ReliableOrdered,
            &bytes,
        );
        if let Some(participant) = self.participants.get_mut(address) {
            participant.call_download_complete = false;
            info!("download complete sent to {}", participant.address);
        }
    }
}
