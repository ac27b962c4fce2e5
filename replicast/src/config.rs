use std::default::Default;

use crate::transport::SendMode;

/// Contains config properties which will be used by a
/// [`ReplicaManager`](crate::ReplicaManager)
#[derive(Clone)]
pub struct ReplicationConfig {
    /// Automatically add newly connected peers as participants. Peers already
    /// connected when this is enabled are not added retroactively.
    pub auto_participate_new_connections: bool,
    /// Queue construction commands for every registered replica whenever a
    /// participant is added. Useful when all objects exist on all peers.
    pub auto_construct_to_new_participants: bool,
    /// Scope given to a replica when its construction is first recorded
    /// against a participant. Serialize messages only flow while in scope.
    pub default_scope: bool,
    /// Channel used for every send issued by the engine.
    pub send_channel: u8,
    /// Delivery discipline for serialize messages. Every other message kind
    /// is always sent reliable-ordered.
    pub serialize_send_mode: SendMode,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            auto_participate_new_connections: false,
            auto_construct_to_new_participants: false,
            default_scope: false,
            send_channel: 0,
            serialize_send_mode: SendMode::ReliableOrdered,
        }
    }
}
