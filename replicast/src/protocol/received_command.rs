use std::net::SocketAddr;

use replicast_serde::OwnedBitReader;

use crate::{
    protocol::{header::MessageHeader, message_kind::MessageKind},
    time::WireInstant,
    types::NetworkId,
};

/// A decoded incoming message parked in a participant's receive queue.
///
/// Payload interpretation is deferred until dispatch: the target replica may
/// not exist locally yet, and the application gets the intervening time to
/// create it or assign its network identifier.
#[derive(Debug)]
pub(crate) struct ReceivedCommand {
    pub sender: SocketAddr,
    pub kind: MessageKind,
    /// Absent only for download-complete
    pub network_id: Option<NetworkId>,
    pub timestamp: Option<WireInstant>,
    /// The in-scope bit for scope-change messages; reserved for other kinds
    pub aux: u32,
    /// Engine-owned; freed after dispatch. Hooks copy out what they keep.
    pub payload: OwnedBitReader,
}

impl ReceivedCommand {
    pub fn new(sender: SocketAddr, header: &MessageHeader, payload: OwnedBitReader) -> Self {
        let kind = header.kind();
        let (network_id, timestamp, aux) = match header {
            MessageHeader::Construction {
                network_id,
                timestamp,
            } => (Some(*network_id), *timestamp, 0),
            MessageHeader::Destruction { network_id } => (Some(*network_id), None, 0),
            MessageHeader::ScopeChange {
                network_id,
                in_scope,
            } => (Some(*network_id), None, u32::from(*in_scope)),
            MessageHeader::Serialize {
                network_id,
                timestamp,
            } => (Some(*network_id), *timestamp, 0),
            MessageHeader::DownloadComplete => (None, None, 0),
        };
        Self {
            sender,
            kind,
            network_id,
            timestamp,
            aux,
            payload,
        }
    }
}
