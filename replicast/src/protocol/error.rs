use std::net::SocketAddr;

use replicast_serde::SerdeErr;
use thiserror::Error;

use crate::protocol::message_kind::MessageKind;

/// Failures while decoding an incoming datagram.
///
/// All of these are recovered locally: the packet is dropped and the error is
/// logged. Nothing propagates to the application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The packet was too short to carry a kind tag
    #[error("empty packet from {sender}")]
    EmptyPacket { sender: SocketAddr },

    /// The kind tag does not name one of the five message kinds
    #[error("unknown message kind byte `{byte}` from {sender}")]
    UnknownKind { byte: u8, sender: SocketAddr },

    /// The fixed header fields could not be decoded
    #[error("malformed {kind:?} header from {sender}")]
    MalformedHeader {
        kind: MessageKind,
        sender: SocketAddr,
        #[source]
        source: SerdeErr,
    },
}
