use std::net::SocketAddr;

use replicast_serde::{BitReader, BitWriter};

use crate::{replica::replica::ReplicaRef, time::WireInstant, types::NetworkId};

/// Outcome of [`ReplicationEvents::resolve_construction`]
pub enum ConstructionOutcome {
    /// The application created the object and assigned its identifier. The
    /// engine references it and records the sender as having it constructed.
    Created(ReplicaRef),
    /// Not ready yet: requeue the message and retry next tick. The rest of
    /// this participant's receive queue waits behind it.
    Defer,
    /// Drop the message with no side effects
    Cancel,
    /// Drop the message and remove the sending participant
    Fatal,
}

/// Engine-level callbacks supplied by the application.
///
/// Passed into [`tick`](crate::ReplicaManager::tick) rather than stored, so
/// the application keeps ownership of whatever state backs them.
pub trait ReplicationEvents {
    /// The network-identifier registry: map an identifier to the local
    /// application object it names, if one exists.
    fn resolve_network_id(&self, network_id: &NetworkId) -> Option<ReplicaRef>;

    /// A construction arrived for an identifier with no local object behind
    /// it. The payload is whatever the sender's `send_construction` hook
    /// wrote; `timestamp` is the send time if the sender stamped one.
    fn resolve_construction(
        &mut self,
        sender: &SocketAddr,
        network_id: NetworkId,
        timestamp: Option<WireInstant>,
        payload: &mut BitReader,
    ) -> ConstructionOutcome;

    /// Append an optional payload to an outgoing download-complete message.
    /// The message is sent whether or not anything is written.
    fn send_download_complete(
        &mut self,
        _now: WireInstant,
        _dest: &SocketAddr,
        _out: &mut BitWriter,
    ) {
    }

    /// A download-complete message arrived from `sender`
    fn receive_download_complete(&mut self, _sender: &SocketAddr, _payload: &mut BitReader) {}
}
