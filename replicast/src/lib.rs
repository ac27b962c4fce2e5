//! # Replicast
//! A replication engine for game objects. The engine tracks an
//! application-owned set of replicas and keeps them coherent across connected
//! participants by mediating construction, scope changes, serialization, and
//! destruction. It never allocates, owns, or frees the application's objects;
//! it decides when the application's serialization hooks run and routes the
//! resulting wire messages.
//!
//! Commands issued against a replica are queued per participant, merged per
//! object, and drained in dependency order on each tick, so the application
//! may issue scope or serialize calls before the object's network identifier
//! exists, and may cancel a construction (with its dependents) by writing
//! nothing from the construction hook.

pub use replicast_serde::{BitReader, BitWrite, BitWriter, OwnedBitReader, Serde, SerdeErr};

mod config;
mod manager;
mod participant;
mod protocol;
mod replica;
mod time;
mod transport;
mod types;

#[cfg(test)]
mod test_support;

pub use config::ReplicationConfig;
pub use manager::{
    events::{ConstructionOutcome, ReplicationEvents},
    manager::ReplicaManager,
};
pub use participant::command::CommandMask;
pub use protocol::{error::ProtocolError, message_kind::MessageKind};
pub use replica::{
    permissions::InterfaceMask,
    registry::ReplicaKey,
    replica::{DeserializeResult, HookResult, Replica, ReplicaRef},
};
pub use time::WireInstant;
pub use transport::{PacketSender, Recipients, SendMode};
pub use types::NetworkId;
