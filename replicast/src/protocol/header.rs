use replicast_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::{protocol::message_kind::MessageKind, time::WireInstant, types::NetworkId};

/// The fixed leading fields of a wire message. Whatever follows the header is
/// an opaque payload owned by the application's hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MessageHeader {
    Construction {
        network_id: NetworkId,
        timestamp: Option<WireInstant>,
    },
    Destruction {
        network_id: NetworkId,
    },
    ScopeChange {
        network_id: NetworkId,
        in_scope: bool,
    },
    Serialize {
        network_id: NetworkId,
        timestamp: Option<WireInstant>,
    },
    DownloadComplete,
}

impl MessageHeader {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageHeader::Construction { .. } => MessageKind::Construction,
            MessageHeader::Destruction { .. } => MessageKind::Destruction,
            MessageHeader::ScopeChange { .. } => MessageKind::ScopeChange,
            MessageHeader::Serialize { .. } => MessageKind::Serialize,
            MessageHeader::DownloadComplete => MessageKind::DownloadComplete,
        }
    }

    pub fn encode(&self, writer: &mut dyn BitWrite) {
        writer.write_byte(self.kind().to_byte());
        match self {
            MessageHeader::Construction {
                network_id,
                timestamp,
            }
            | MessageHeader::Serialize {
                network_id,
                timestamp,
            } => {
                timestamp.ser(writer);
                network_id.ser(writer);
            }
            MessageHeader::Destruction { network_id } => {
                network_id.ser(writer);
            }
            MessageHeader::ScopeChange {
                network_id,
                in_scope,
            } => {
                network_id.ser(writer);
                in_scope.ser(writer);
            }
            MessageHeader::DownloadComplete => {}
        }
    }

    /// Decode the fields following an already-consumed kind tag
    pub fn decode(kind: MessageKind, reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match kind {
            MessageKind::Construction => {
                let timestamp = Option::<WireInstant>::de(reader)?;
                let network_id = NetworkId::de(reader)?;
                Ok(MessageHeader::Construction {
                    network_id,
                    timestamp,
                })
            }
            MessageKind::Serialize => {
                let timestamp = Option::<WireInstant>::de(reader)?;
                let network_id = NetworkId::de(reader)?;
                Ok(MessageHeader::Serialize {
                    network_id,
                    timestamp,
                })
            }
            MessageKind::Destruction => Ok(MessageHeader::Destruction {
                network_id: NetworkId::de(reader)?,
            }),
            MessageKind::ScopeChange => {
                let network_id = NetworkId::de(reader)?;
                let in_scope = bool::de(reader)?;
                Ok(MessageHeader::ScopeChange {
                    network_id,
                    in_scope,
                })
            }
            MessageKind::DownloadComplete => Ok(MessageHeader::DownloadComplete),
        }
    }
}
